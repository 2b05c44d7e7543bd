//! SMPP v3.4 gateway sessions: wire codec, multipart engine, client and
//! server session state machines, and the registry tying them together.
//!
//! # Examples
//!
//! ## Sending through an SMSC
//!
//! ```rust,no_run
//! use smpp_gate::datatypes::BodyFormat;
//! use smpp_gate::gate::Gate;
//! use smpp_gate::session::SessionConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gate = Gate::with_tracing();
//!     let session = gate.add_client(
//!         "upstream",
//!         SessionConfig::new("system_id", "password").with_address("localhost", 2775),
//!     )?;
//!
//!     session.connect().await?;
//!     if session.wait_bound(Duration::from_secs(10)).await {
//!         session
//!             .submit("1", "0987654321", "1234567890", "Hello, World!", BodyFormat::Ascii, true)
//!             .await?;
//!     }
//!
//!     gate.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Accepting ESMEs
//!
//! ```rust,no_run
//! use smpp_gate::gate::Gate;
//! use smpp_gate::server;
//! use smpp_gate::session::SessionConfig;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gate = Gate::with_tracing();
//!     gate.add_server("partner", SessionConfig::new("partner", "secret"))?;
//!
//!     let listener = TcpListener::bind("0.0.0.0:2775").await?;
//!     server::run(listener, gate, tokio::signal::ctrl_c()).await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod datatypes;
pub mod gate;
pub mod gsm;
pub mod hex;
mod macros;
pub mod message;
pub mod multipart;
pub mod server;
pub mod session;

#[cfg(test)]
mod tests;

// Re-export codec types for direct access
pub use codec::{CodecError, Decodable, Encodable, Frame, PduHeader, PduRegistry};

// Re-export the main session API for easy access
pub use gate::Gate;
pub use session::{
    GateEvents, NewMessage, Session, SessionConfig, SessionState, SmppError, SmppResult,
    SubmitError,
};
