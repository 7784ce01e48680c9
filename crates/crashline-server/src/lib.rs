//! Crashline Server - A small TCP server that reports its own panics
//!
//! The server assigns itself an identity on startup and publishes it, along
//! with its store and connection counts, to the crash reporter so that any
//! panic inside the process is reported with server context.

pub mod id;
pub mod server;

pub use id::ServerId;
pub use server::Server;
