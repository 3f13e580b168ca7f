//! Background worker thread owning the record store.
//!
//! All store I/O happens on one dedicated thread so async callers never block
//! on file writes, and so requests are applied strictly one at a time.
//!
//! # Architecture
//!
//! - `messages`: Request protocol with caller span propagation
//! - `handler`: Worker loop, notification after mutations, and the client handle

pub mod handler;
pub mod messages;

pub use handler::{StoreHandle, StoreWorker};
pub use messages::{Envelope, StoreRequest};
