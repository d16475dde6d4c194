use thiserror::Error;

pub type FlowResult<T> = Result<T, FlowError>;

/// Failure taxonomy for the SDK. Malformed inbound messages are swallowed at
/// the bridge boundary (dropped and logged); every other kind propagates to
/// the immediate caller.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out waiting for a reply")]
    Timeout,

    #[error("Renderer channel closed")]
    ChannelClosed,

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Presentation failed: {0}")]
    PresentationFailed(String),

    #[error("Purchase failed: {0}")]
    PurchaseFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
