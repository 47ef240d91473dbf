//! WebSocket transport, wire protocol and outbound routing

pub mod gateway;
pub mod handler;
pub mod protocol;
