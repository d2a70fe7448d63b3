//! nvim-tui library
//!
//! Drives an embedded Neovim over MessagePack-RPC and keeps a local copy of
//! its screen:
//!
//! - `rpc` - codec, transport, correlation table and the `RpcClient`
//! - `api` - typed wrappers over the editor's remote methods
//! - `value` - narrowing of wire values, buffer/window/tabpage handles
//! - `redraw` - decoding of `redraw` notifications into operations
//! - `grid` - the screen state machine those operations drive
//! - `render` - painting a grid onto a front-end surface
//! - `session` - spawning the editor and wiring all of the above
//! - `config` - launch configuration
//!
//! # Example
//!
//! ```ignore
//! use nvim_tui::config::EditorConfig;
//! use nvim_tui::session::Session;
//!
//! let session = Session::spawn(&EditorConfig::load()?, None)?;
//! session.attach().await?;
//! session.send_input("ihello<Esc>").await?;
//! let screen = session.grid().snapshot();
//! ```

pub mod api;
pub mod config;
pub mod grid;
pub mod redraw;
pub mod render;
pub mod rpc;
pub mod session;
pub mod value;
