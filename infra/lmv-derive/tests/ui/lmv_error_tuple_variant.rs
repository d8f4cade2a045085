use lmv_derive::lmv_error;

#[lmv_error]
pub enum DemoError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

fn main() {}
