use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error body.
    #[error("{message} ({status})")]
    Api { status: StatusCode, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("gateway closed during handshake")]
    GatewayClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caught before anything was sent.
    #[error("{0}")]
    Validation(&'static str),

    #[error("not signed in")]
    NotSignedIn,
}

impl ClientError {
    /// Text to show the user, with known auth messages translated.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => crate::validation::translate_auth_error(message),
            Self::Validation(msg) => (*msg).to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
