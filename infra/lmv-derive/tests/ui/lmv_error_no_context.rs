use lmv_derive::lmv_error;

#[lmv_error]
pub enum DemoError {
    #[error("IO error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

fn main() {}
