// ABOUTME: SMPP session module: the per-channel state machine and everything it leans on
// ABOUTME: Exports sessions, their configuration, error types, observers and bookkeeping

//! SMPP Session Module
//!
//! A [`Session`] is one SMPP channel, either dialed out to an SMSC (client)
//! or accepted from an ESME (server). It owns the transport, answers the
//! peer's requests, keeps the link alive and reports everything it does to a
//! [`GateEvents`] observer.
//!
//! * **Non-blocking submit** - `submit` returns as soon as the PDUs are
//!   written; the `*_resp` arrives as a status event later
//! * **Keep-alive and timeout** - `enquire_link` every interval, teardown
//!   when a request goes unanswered on a silent channel
//! * **Multipart** - long bodies are segmented on the way out and reassembled
//!   on the way in
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smpp_gate::datatypes::BodyFormat;
//! use smpp_gate::session::{KeepAliveConfig, Session, SessionConfig, TracingEvents};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new("system_id", "password")
//!     .with_address("localhost", 2775)
//!     .with_keep_alive(KeepAliveConfig::new(Duration::from_secs(30)));
//!
//! let session = Session::client("smsc", config, Arc::new(TracingEvents));
//! session.connect().await?;
//!
//! if session.wait_bound(Duration::from_secs(10)).await {
//!     session
//!         .submit("1", "123456789", "987654321", "Hello!", BodyFormat::Ascii, false)
//!         .await?;
//! }
//!
//! session.quit().await;
//! # Ok(())
//! # }
//! ```
//!
//! Sessions that should reconnect on their own are created through a
//! [`Gate`](crate::gate::Gate) instead.

mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod keepalive;
pub mod throttle;
pub mod tracker;

pub use channel::{Role, Session, SessionState};
pub use config::SessionConfig;
pub use error::{SmppError, SmppResult, SubmitError};
pub use events::{GateEvents, NewMessage, TracingEvents};
pub use keepalive::{KeepAliveConfig, KeepAliveManager, KeepAliveStatus};
pub use throttle::{Throttle, ThrottleStatistics};
pub use tracker::{SubmissionTracker, Submission};
