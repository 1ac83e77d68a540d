// ABOUTME: Container gateway for runbox fleet nodes
// ABOUTME: Remote filesystem and script execution inside the pre-provisioned sandbox container

pub mod archive;
pub mod error;
pub mod gateway;
pub mod listing;
pub mod runtime;

pub use error::{GatewayError, Result};
pub use gateway::{ContainerGateway, GatewayConfig, ScriptOutput, DEFAULT_INTERPRETER};
pub use listing::parse_long_listing;
pub use runtime::docker::{DEFAULT_DOCKER_PORT, LOCAL_ADDRESS};
pub use runtime::{
    ContainerRuntime, ContainerSummary, DockerConnector, DockerRuntime, ExecResult,
    RuntimeConnector,
};
