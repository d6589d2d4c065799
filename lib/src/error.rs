use thiserror::Error;

/// Failures surfaced by the graphics session and its platform seams.
///
/// Everything here is fatal for the current frame. A camera whose pose can't
/// be resolved is not an error and never ends up in this type.
#[derive(Error, Debug)]
pub enum GraphicsError {
    #[error("unable to create graphics device: {0}")]
    DeviceCreation(String),

    #[error("unable to create {resource}: {reason}")]
    ResourceCreation {
        resource: &'static str,
        reason: String,
    },

    #[error("back buffer unavailable: {0}")]
    BackBufferUnavailable(String),

    #[error("invalid render target size {width}x{height}")]
    InvalidSize {
        width: u32,
        height: u32,
    },

    #[error("unable to commit depth buffer: {0}")]
    DepthCommit(String),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphicsError>;
