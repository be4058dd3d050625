//! Control socket.
//!
//! Length-prefixed s-expression messages over a Unix socket.  Clients
//! must open with `(:type :hello :version 1)`.

pub mod dispatch;
pub mod server;

pub use server::IpcServer;
