// ABOUTME: Data model shared by the orchestrator, gateway and bridge
// ABOUTME: Projects, lifecycle intents and their queue wire format, fleet nodes, directory entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Project languages supported by the sandbox images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "typescript")]
    TypeScript,
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "react")]
    React,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "cSharp")]
    CSharp,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "rust")]
    Rust,
    #[serde(rename = "c++")]
    Cpp,
    #[serde(rename = "c")]
    C,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Python => "python",
            Self::React => "react",
            Self::Html => "html",
            Self::CSharp => "cSharp",
            Self::Java => "java",
            Self::Rust => "rust",
            Self::Cpp => "c++",
            Self::C => "c",
        }
    }

    /// Interpreter able to run a single script file of this language.
    ///
    /// Compiled languages and markup have none.
    pub fn interpreter(&self) -> Option<&'static str> {
        match self {
            Self::JavaScript | Self::React => Some("node"),
            Self::TypeScript => Some("ts-node"),
            Self::Python => Some("python3"),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project as written by the front end.
///
/// Treated as an immutable value once read off the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub name: String,
    pub language: Language,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastUsed", default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Kind of lifecycle change requested for a project's sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Up,
    Down,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentKind {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(IntentError::UnknownKind(other.to_string())),
        }
    }
}

/// Reasons a queued record cannot be turned into a [`LifecycleIntent`]
#[derive(Error, Debug)]
pub enum IntentError {
    #[error("Unknown intent type: {0}")]
    UnknownKind(String),

    #[error("Intent of type '{0}' is missing its project")]
    MissingProject(IntentKind),

    #[error("Down intent is missing the node address")]
    MissingAddress,

    #[error("Intent is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Flat queue record `{type, project, ip}` exactly as producers write it.
///
/// `type` stays a raw string so that unknown kinds surface as an
/// [`IntentError`] instead of failing the whole decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub project: Option<Project>,
    #[serde(default)]
    pub ip: Option<String>,
}

/// A validated request to bring a sandbox up or tear it down
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleIntent {
    Up {
        project: Project,
    },
    Down {
        address: String,
        project: Option<Project>,
    },
}

impl LifecycleIntent {
    /// Decode and validate a raw queue payload
    pub fn parse(payload: &str) -> Result<Self, IntentError> {
        let record: IntentRecord = serde_json::from_str(payload)?;
        Self::from_record(record)
    }

    pub fn from_record(record: IntentRecord) -> Result<Self, IntentError> {
        match record.kind.parse::<IntentKind>()? {
            IntentKind::Up => {
                let project = record
                    .project
                    .ok_or(IntentError::MissingProject(IntentKind::Up))?;
                Ok(Self::Up { project })
            }
            IntentKind::Down => {
                let address = record
                    .ip
                    .filter(|ip| !ip.trim().is_empty())
                    .ok_or(IntentError::MissingAddress)?;
                Ok(Self::Down {
                    address,
                    project: record.project,
                })
            }
        }
    }

    pub fn to_record(&self) -> IntentRecord {
        match self {
            Self::Up { project } => IntentRecord {
                kind: IntentKind::Up.as_str().to_string(),
                project: Some(project.clone()),
                ip: None,
            },
            Self::Down { address, project } => IntentRecord {
                kind: IntentKind::Down.as_str().to_string(),
                project: project.clone(),
                ip: Some(address.clone()),
            },
        }
    }

    /// Encode as a queue payload
    pub fn to_payload(&self) -> Result<String, IntentError> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            Self::Up { .. } => IntentKind::Up,
            Self::Down { .. } => IntentKind::Down,
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Up { project } => Some(&project.id),
            Self::Down { project, .. } => project.as_ref().map(|p| p.id.as_str()),
        }
    }
}

/// A provisioned compute unit. Exported as `{id, ip}` in fleet snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FleetNode {
    #[serde(rename = "id")]
    pub node_id: String,
    #[serde(rename = "ip")]
    pub address: String,
}

impl FleetNode {
    pub fn new(node_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            address: address.into(),
        }
    }
}

/// Published on the project's channel once its sandbox is reachable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub project: Project,
    pub ip: String,
}

/// One row of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
    pub permissions: String,
    pub size_bytes: u64,
    /// Date/time columns as printed by the listing, e.g. `Jan 1 00:00`
    pub modified_at: String,
}
