#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    #[error("failed to create pipeline: {0:#}")]
    PipelineCreation(anyhow::Error),

    #[error("converter already started")]
    AlreadyStarted,

    #[error("converter is closed")]
    Closed,

    #[error("failed to spawn pipeline thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConverterError>;
