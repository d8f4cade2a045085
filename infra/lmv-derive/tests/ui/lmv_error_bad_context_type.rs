use lmv_derive::lmv_error;

#[lmv_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<String>,
    },
}

fn main() {}
