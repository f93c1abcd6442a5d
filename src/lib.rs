use thiserror::Error;

pub type Result<T> = std::result::Result<T, ColdreachError>;

#[derive(Error, Debug)]
pub enum ColdreachError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No content found in the document")]
    EmptyDocument,

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Store access error: {0}")]
    StoreAccess(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod fetch;
pub mod generator;
pub mod ingest;
pub mod jobinfo;
pub mod ollama;
pub mod session;
pub mod store;
