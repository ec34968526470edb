#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

use super::frame::CloseCode;

/// WebSocket error variants.
///
/// Most of these never leave the connection core: they are logged and reflected in the
/// observable connection state instead of being returned to the caller.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error connecting to or communicating with the WebSocket server
    Connection(tokio_tungstenite::tungstenite::Error),
    /// Error parsing a WebSocket message
    MessageParse(serde_json::Error),
    /// WebSocket connection was closed
    ConnectionClosed {
        /// Close code reported by the transport, if any
        code: Option<CloseCode>,
    },
    /// Frame dropped because the connection is not open
    NotConnected,
    /// Automatic reconnection gave up
    ReconnectExhausted {
        /// Number of attempts that were scheduled before giving up
        attempts: u32,
    },
    /// `reconnect` was requested before any endpoint was known
    MissingEndpoint,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::MessageParse(e) => write!(f, "Failed to parse WebSocket message: {e}"),
            Self::ConnectionClosed { code: Some(code) } => {
                write!(f, "WebSocket connection closed ({code})")
            }
            Self::ConnectionClosed { code: None } => write!(f, "WebSocket connection closed"),
            Self::NotConnected => write!(f, "WebSocket is not connected"),
            Self::ReconnectExhausted { attempts } => {
                write!(f, "Reconnection gave up after {attempts} attempts")
            }
            Self::MissingEndpoint => write!(f, "No endpoint to reconnect to"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::MessageParse(e) => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, WsError::Connection(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Kind};

    #[test]
    fn closed_display_includes_code() {
        let error = WsError::ConnectionClosed {
            code: Some(CloseCode::ABNORMAL),
        };
        assert_eq!(
            error.to_string(),
            "WebSocket connection closed (1006 abnormal closure)"
        );
    }

    #[test]
    fn ws_error_converts_to_websocket_kind() {
        let error: Error = WsError::ReconnectExhausted { attempts: 5 }.into();
        assert_eq!(error.kind(), Kind::WebSocket);
        assert!(error.to_string().contains("after 5 attempts"));
    }
}
