//! A multiplexed GraphBinary client for a Gremlin Server: one request maps
//! to many streamed response frames, many requests share a pool of
//! connections, and a session handle layers a transactional lifecycle on
//! top (spec.md §1–§2).
//!
//! Module layout mirrors the component table in spec.md §2, leaves first:
//! [`transport`] (byte-oriented framed channel) → [`protocol`] (request
//! framing, auth challenge, status dispatch) → [`result_set`] (per-request
//! streaming sink) → [`connection`] (binds one transport to one protocol
//! engine) → [`pool`] (load-balances connections) → [`session`] (bound
//! transactional handle) → [`client`] (the top-level entry point).

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod request;
pub mod response;
pub mod result_set;
pub mod session;
pub mod transport;

pub use auth::{AuthInfo, TlsConfig};
pub use client::GremlinClient;
pub use connection::{Connection, ConnectionConfig};
pub use error::{Error, ProtocolError, Result, TransportError, UsageError};
pub use pool::{Pool, PoolConfig};
pub use request::Request;
pub use response::{Response, ResponseResult, Status, StatusCode};
pub use result_set::{GremlinResult, ResultSet};
pub use session::Session;
pub use transport::{Transport, TransporterFactory, TransportConfig, WebSocketTransport, WebSocketTransporterFactory};

pub use graphbinary::{Bytecode, CodecError, Instruction, TypeCode, Uuid, Value, ValueMap};
