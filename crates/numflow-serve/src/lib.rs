//! numflow-serve - WebSocket worker service for numflow
//!
//! Clients send JSON requests to run source, bind values, read primitive
//! help and ask for the worker's locality. Each connection evaluates in its
//! own engine session.

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, WireValue};
pub use server::{NumflowServer, ServerError};

pub use numflow::{Engine, EngineConfig};
