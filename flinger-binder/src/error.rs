use flinger_core::CoreError;
use flinger_gui::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum BinderError {
    #[error("Socket creation failed: {0}")]
    SocketCreation(String),
    #[error("Client connection error: {0}")]
    ClientConnection(String),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
