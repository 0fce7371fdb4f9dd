use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatforestError {
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("csv file is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no valid chat data found in {path}")]
    NoValidRows { path: PathBuf },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("summarizer error: {0}")]
    Summarizer(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid json in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ChatforestError>;
