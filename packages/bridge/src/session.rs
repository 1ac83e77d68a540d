// ABOUTME: Per-connection session executing bridge requests against one container gateway
// ABOUTME: Converts gateway results and errors into response frames

use crate::protocol::{BridgeRequest, ContentEncoding, ErrorCode, InboundFrame, OutboundFrame};
use base64::{engine::general_purpose, Engine as _};
use runbox_core::Project;
use runbox_sandbox::{ContainerGateway, GatewayError};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
enum RequestError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("content is not valid base64: {0}")]
    BadContent(#[from] base64::DecodeError),
}

impl From<&RequestError> for ErrorCode {
    fn from(error: &RequestError) -> Self {
        match error {
            RequestError::Gateway(e) => ErrorCode::from(e),
            RequestError::BadContent(_) => ErrorCode::BadRequest,
        }
    }
}

/// UTF-8 content goes out as-is, anything else as base64
fn encode_content(bytes: Vec<u8>) -> (String, ContentEncoding) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, ContentEncoding::Utf8),
        Err(e) => (
            general_purpose::STANDARD.encode(e.into_bytes()),
            ContentEncoding::Base64,
        ),
    }
}

fn decode_content(content: String, encoding: ContentEncoding) -> Result<Vec<u8>, RequestError> {
    match encoding {
        ContentEncoding::Utf8 => Ok(content.into_bytes()),
        ContentEncoding::Base64 => Ok(general_purpose::STANDARD.decode(content)?),
    }
}

pub struct Session {
    gateway: ContainerGateway,
    address: String,
    /// Interpreter implied by the project language, if any
    interpreter: Option<String>,
}

impl Session {
    pub fn new(gateway: ContainerGateway, address: impl Into<String>, project: Option<&Project>) -> Self {
        Self {
            gateway,
            address: address.into(),
            interpreter: project
                .and_then(|p| p.language.interpreter())
                .map(str::to_string),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Run one request to completion and build its response frame
    pub async fn respond(&self, frame: InboundFrame) -> OutboundFrame {
        let op = frame.request.op();
        debug!("Bridge request {} on {}", op, self.address);

        match self.dispatch(frame.request).await {
            Ok(data) => OutboundFrame::Result {
                id: frame.id,
                op: op.to_string(),
                data,
            },
            Err(e) => {
                warn!("Bridge request {} on {} failed: {}", op, self.address, e);
                OutboundFrame::error(frame.id, ErrorCode::from(&e), e.to_string())
            }
        }
    }

    async fn dispatch(&self, request: BridgeRequest) -> Result<Value, RequestError> {
        match request {
            BridgeRequest::ListFiles { path } => {
                let entries = self.gateway.list_files(&path).await?;
                Ok(json!({ "path": path, "entries": entries }))
            }
            BridgeRequest::ReadFile { path } => {
                let (content, encoding) = encode_content(self.gateway.get_file_content(&path).await?);
                Ok(json!({
                    "path": path,
                    "content": content,
                    "encoding": encoding,
                }))
            }
            BridgeRequest::WriteFile {
                path,
                content,
                encoding,
            } => {
                let bytes = decode_content(content, encoding)?;
                self.gateway.write_file(&path, &bytes).await?;
                Ok(json!({ "path": path, "bytes": bytes.len() }))
            }
            BridgeRequest::Delete { path } => {
                self.gateway.delete_entry(&path).await?;
                Ok(json!({ "path": path }))
            }
            BridgeRequest::Mkdir { path } => {
                self.gateway.create_directory(&path).await?;
                Ok(json!({ "path": path }))
            }
            BridgeRequest::Execute {
                path,
                args,
                interpreter,
            } => {
                let output = match interpreter.or_else(|| self.interpreter.clone()) {
                    Some(interpreter) => {
                        self.gateway
                            .execute_script_with(&interpreter, &path, &args)
                            .await?
                    }
                    None => self.gateway.execute_script(&path, &args).await?,
                };
                Ok(serde_json::to_value(output).unwrap_or(Value::Null))
            }
        }
    }
}
