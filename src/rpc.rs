//! MessagePack-RPC transport for an embedded editor.
//!
//! The editor runs as a child process; its stdin/stdout carry
//! MessagePack-RPC frames and its stderr carries free-form diagnostics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐        stdin (requests)        ┌──────────────────┐
//! │    RpcClient     │ ─────────────────────────────► │                  │
//! │  (call / notify) │                                │   nvim --embed   │
//! │                  │ ◄───────────────────────────── │                  │
//! └──────────────────┘  stdout (responses, redraw)    └──────────────────┘
//!          ▲                                                   │
//!          │ resolve(id)                              stderr   │
//!   ┌──────┴───────┐                                           ▼
//!   │ PendingTable │                                  drain_diagnostics
//!   └──────────────┘                                   (logged only)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use nvim_tui::rpc::RpcClient;
//! use rmpv::Value;
//!
//! let (client, _reader) = RpcClient::spawn(stdout, stdin, None);
//! let name = client.call("buffer_get_name", vec![Value::from(1)]).await?;
//! ```

mod client;
pub mod codec;
mod pending;
pub mod transport;

pub use client::{ConnectionState, RedrawHandler, RpcClient, RpcError, REDRAW_METHOD};
pub use codec::{CodecError, Message};
pub use pending::{PendingTable, Response};
