use serde::Deserialize;

pub const SELECT_IMAGE: &str = "Select an image";
pub const COMPRESSION_FAILED: &str = "Compression failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally, nothing was sent.
    Validation,
    /// Connectivity, timeout or DNS failure; no response body.
    Transport,
    /// Non-2xx response from the compression service.
    Server,
    /// The result arrived but could not be handed to the save capability.
    Save,
}

/// The single user-visible error of a workflow. Only `message` is shown.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct WorkflowError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl WorkflowError {
    pub fn select_image() -> Self {
        Self { kind: ErrorKind::Validation, message: SELECT_IMAGE.to_string() }
    }

    /// Transport failures carry the client's own description, if it has one.
    pub fn transport(description: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: non_empty(description.into()).unwrap_or_else(|| COMPRESSION_FAILED.to_string()),
        }
    }

    pub fn save(description: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Save,
            message: non_empty(description.into()).unwrap_or_else(|| COMPRESSION_FAILED.to_string()),
        }
    }

    /// Server failures surface the `message` field of a JSON body, else the generic fallback.
    pub fn from_server_body(body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .and_then(non_empty)
            .unwrap_or_else(|| COMPRESSION_FAILED.to_string());

        Self { kind: ErrorKind::Server, message }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_message_wins() {
        let e = WorkflowError::from_server_body(br#"{"message":"File too large"}"#);
        assert_eq!(e.kind, ErrorKind::Server);
        assert_eq!(e.message, "File too large");
        assert_eq!(e.to_string(), "File too large");
    }

    #[test]
    fn empty_or_unstructured_body_falls_back() {
        let bodies: [&[u8]; 6] = [b"", b"<html>oops</html>", br#"{"error":"x"}"#, br#"{"message":""}"#, br#"{"message":null}"#, br#"{"message":42}"#];
        for body in bodies {
            assert_eq!(WorkflowError::from_server_body(body).message, COMPRESSION_FAILED);
        }
    }

    #[test]
    fn transport_without_description_falls_back() {
        assert_eq!(WorkflowError::transport("").message, COMPRESSION_FAILED);
        assert_eq!(WorkflowError::transport("connection refused").message, "connection refused");
        assert_eq!(WorkflowError::transport("x").kind, ErrorKind::Transport);
    }

    #[test]
    fn validation_message_is_fixed() {
        let e = WorkflowError::select_image();
        assert_eq!(e.kind, ErrorKind::Validation);
        assert_eq!(e.message, "Select an image");
    }
}
