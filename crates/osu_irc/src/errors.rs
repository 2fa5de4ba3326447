use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrcClientError {
    /// The server answered 464: bad password. Fatal for the connection.
    #[error("Login failed: '{0}'")]
    LoginFailed(String),

    /// The read side reached end-of-stream without a requested shutdown.
    #[error("Connection closed by remote end")]
    StreamClosed,

    #[error("Cannot send to '{0}': channel was left")]
    NotInChannel(String),

    /// A line or value could not be parsed.
    #[error("Parsing error: '{0}'")]
    ParsingError(String),

    /// A pattern matched but one of its captures failed secondary parsing.
    #[error("Invalid capture for '{field}': '{value}'")]
    InvalidCapture { field: &'static str, value: String },

    #[error("I/O error: '{0}'")]
    Io(String),

    #[error("Configuration error: '{0}'")]
    Config(String),

    #[error("Profile lookup error: '{0}'")]
    Profile(String),

    #[error("Profile lookup requires an api key")]
    ProfileUnavailable,

    #[error("Client is not connected")]
    NotConnected,
}

impl From<std::io::Error> for IrcClientError {
    fn from(err: std::io::Error) -> Self {
        IrcClientError::Io(err.to_string())
    }
}

impl IrcClientError {
    pub fn invalid_capture(field: &'static str, value: &str) -> Self {
        IrcClientError::InvalidCapture {
            field,
            value: value.to_owned(),
        }
    }

    /// Connection-level errors stop the read loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IrcClientError::LoginFailed(_) | IrcClientError::StreamClosed
        )
    }
}

/// Error type returned by user callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;
