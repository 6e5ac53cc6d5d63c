use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid product type: {0}")]
    InvalidProductType(String),

    #[error("Invalid scan id: {0}")]
    InvalidScanId(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
