//! # buildora-sandbox
//!
//! Runs composed documents in an isolated execution context and relays their
//! diagnostics back to the host.
//!
//! - [`SandboxHost`] owns the project-facing side: run/stop, reload, and a fresh
//!   context generation per render.
//! - [`EventRelay`] is a separate task joined to the sandbox by a one-way
//!   channel. It validates envelopes and appends them to a [`DiagnosticLog`].
//! - [`PreviewServer`] is the concrete context: an axum server whose page posts
//!   envelopes back to `/__relay/{generation}`.

mod host;
mod relay;
mod server;

pub use host::{ExecutionContext, SandboxHost};
pub use relay::{
    Delivery, DiagnosticEntry, DiagnosticLevel, DiagnosticLog, Envelope, EventRelay, RelaySender,
};
pub use server::{PreviewServer, RELAY_ROUTE};
