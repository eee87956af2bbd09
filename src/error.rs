use thiserror::Error;

pub type DrawResult<T> = Result<T, DrawError>;

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("unknown sprite type `{0}`")]
    UnknownSpriteKind(String),

    #[error("unknown sprite id {0}")]
    UnknownSprite(u64),

    #[error("unknown gradient handle {0}")]
    UnknownGradient(u32),

    #[error("invalid sprite descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("invalid surface config: {0}")]
    InvalidConfig(String),

    #[error("reconciliation pass is already running")]
    ReentrantReconcile,
}
