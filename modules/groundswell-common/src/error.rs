use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroundswellError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing reference: {0}")]
    MissingReference(String),

    #[error("Referential mismatch: {0}")]
    ReferentialMismatch(String),

    #[error("Aggregate update failure: {0}")]
    AggregateUpdate(String),

    #[error("Reconciliation failure: {0}")]
    Reconciliation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
