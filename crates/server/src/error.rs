use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] parlor_store::Error),

    #[error(transparent)]
    Config(#[from] parlor_config::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not resolve bind address '{address}'")]
    Resolve { address: String },

    #[error("server is already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, Error>;
