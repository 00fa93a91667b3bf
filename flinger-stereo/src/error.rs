use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StereoError {
    #[error("Unknown stereo render mode '{0}'")]
    UnknownRenderMode(String),
}
