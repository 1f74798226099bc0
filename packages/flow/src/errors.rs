//! Error types for the flow model

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error("Invalid cell position: {0}")]
    InvalidCellPosition(String),

    #[error("Invalid flow data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        FlowError::InvalidData(e.to_string())
    }
}
