use thiserror::Error;

/// Shown for any transport or payload failure; details go to the log.
pub const GENERIC_FAILURE: &str = "Failed to get a reply. Please try again.";

/// Failures of a single chat exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Endpoint or credential missing; no request was attempted.
    #[error("configuration error: {0}")]
    Config(String),
    /// Unreachable host, timeout or non-2xx status.
    #[error("transport error: {0}")]
    Transport(String),
    /// A response arrived but wasn't `{ "message": string }`.
    #[error("malformed reply: {0}")]
    Payload(String),
    /// Another request is still in flight.
    #[error("a request is already in flight")]
    Busy,
}

impl ChatError {
    /// Text for the error slot. Transport and payload failures look the same to the user.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Config(detail) => format!("Configuration error: {}", detail),
            ChatError::Transport(_) | ChatError::Payload(_) => GENERIC_FAILURE.to_string(),
            ChatError::Busy => "Still waiting for the previous reply.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Payload(err.to_string())
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

/// Failures of the CSV side channel. Never shown to the user.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export unavailable")]
    Unavailable,
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_and_payload_share_user_message() {
        let transport = ChatError::Transport("connection refused".into());
        let payload = ChatError::Payload("missing field `message`".into());
        assert_eq!(transport.user_message(), payload.user_message());
        assert_eq!(transport.user_message(), GENERIC_FAILURE);
    }

    #[test]
    fn test_config_message_names_detail() {
        let err = ChatError::Config("API key is not set".into());
        assert!(err.user_message().contains("API key is not set"));
    }
}
