use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    #[error("Invalid configuration format: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    #[error("No saved wallet named {0:?}; run deploy first")]
    WalletNotFound(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CliError {
    fn from(e: toml::de::Error) -> Self {
        CliError::InvalidConfig(e.to_string())
    }
}
