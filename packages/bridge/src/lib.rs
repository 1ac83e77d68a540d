// ABOUTME: Realtime bridge between browser clients and sandbox containers
// ABOUTME: WebSocket server binding each connection to a project's fleet node

pub mod binding;
pub mod protocol;
pub mod server;
pub mod session;

pub use binding::{resolve, BindError, Binding, ConnectParams};
pub use protocol::{
    parse_frame, BridgeRequest, ContentEncoding, ErrorCode, InboundFrame, OutboundFrame, GREETING,
};
pub use server::{router, serve, BridgeSettings, BridgeState};
pub use session::Session;
