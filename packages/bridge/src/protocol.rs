// ABOUTME: Wire protocol of the realtime bridge: tagged JSON requests and typed response frames
// ABOUTME: Unknown operations and non-JSON input become explicit error frames

use runbox_sandbox::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Greeting text sent on every successful connection
pub const GREETING: &str = "Hello! Message From Server!!";

/// How file content travels in a JSON string. Text that is not valid UTF-8
/// goes out as base64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Utf8,
    Base64,
}

/// A client command, dispatched by its `op` tag
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeRequest {
    ListFiles {
        path: String,
    },
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        content: String,
        #[serde(default)]
        encoding: ContentEncoding,
    },
    Delete {
        path: String,
    },
    Mkdir {
        path: String,
    },
    Execute {
        path: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        interpreter: Option<String>,
    },
}

impl BridgeRequest {
    pub fn op(&self) -> &'static str {
        match self {
            Self::ListFiles { .. } => "list_files",
            Self::ReadFile { .. } => "read_file",
            Self::WriteFile { .. } => "write_file",
            Self::Delete { .. } => "delete",
            Self::Mkdir { .. } => "mkdir",
            Self::Execute { .. } => "execute",
        }
    }
}

/// A request plus the client's correlation id, echoed back on the response
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub id: Option<Value>,
    pub request: BridgeRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    RemoteCommandFailed,
    Timeout,
    Unavailable,
    /// The connection already has a full request backlog
    Busy,
    Transport,
}

impl From<&GatewayError> for ErrorCode {
    fn from(error: &GatewayError) -> Self {
        match error {
            GatewayError::ContainerNotFound(_) | GatewayError::FileNotFound(_) => Self::NotFound,
            GatewayError::InvalidPath(_) => Self::BadRequest,
            GatewayError::RemoteCommandFailure { .. } => Self::RemoteCommandFailed,
            GatewayError::Timeout { .. } => Self::Timeout,
            GatewayError::ContainerNotReady { .. } => Self::Unavailable,
            GatewayError::Docker(_) | GatewayError::Connection(_) | GatewayError::Io(_) => {
                Self::Transport
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Connected {
        project: Option<String>,
        address: String,
        message: String,
    },
    Result {
        id: Option<Value>,
        op: String,
        data: Value,
    },
    Error {
        id: Option<Value>,
        code: ErrorCode,
        message: String,
    },
}

impl OutboundFrame {
    pub fn connected(project: Option<String>, address: impl Into<String>) -> Self {
        Self::Connected {
            project,
            address: address.into(),
            message: GREETING.to_string(),
        }
    }

    pub fn error(id: Option<Value>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            code,
            message: message.into(),
        }
    }

    pub fn to_text(&self) -> String {
        // Serializing these plain enums cannot fail
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","id":null,"code":"transport","message":"{}"}}"#,
                e
            )
        })
    }
}

/// Parse a text frame into a request, keeping the id for the error frame
/// when the request itself is unusable.
pub fn parse_frame(text: &str) -> Result<InboundFrame, OutboundFrame> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        OutboundFrame::error(None, ErrorCode::BadRequest, format!("invalid JSON: {}", e))
    })?;

    let id = value.get("id").filter(|id| !id.is_null()).cloned();

    let request: BridgeRequest = serde_json::from_value(value).map_err(|e| {
        OutboundFrame::error(
            id.clone(),
            ErrorCode::BadRequest,
            format!("unsupported request: {}", e),
        )
    })?;

    Ok(InboundFrame { id, request })
}
