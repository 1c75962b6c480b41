use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown authorization status: {0}")]
    UnknownStatus(String),
}
