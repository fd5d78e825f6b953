use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    /// The server answered but refused the operation.
    #[error("{0}")]
    Rejected(String),
    /// The request never produced a usable answer.
    #[error("{0}")]
    Transport(String),
}

impl DataSourceError {
    /// Message for a notification, falling back when the failure carried none.
    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        let message = match self {
            Self::Rejected(message) | Self::Transport(message) => message.trim(),
        };
        if message.is_empty() {
            fallback
        } else {
            message
        }
    }
}

impl From<reqwest::Error> for DataSourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
