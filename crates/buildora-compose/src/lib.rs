//! # buildora-compose
//!
//! Turns a [`ProjectGraph`](buildora_core::ProjectGraph) into a single
//! self-contained document that can run inside the preview sandbox.
//!
//! Composition is a pure function of the graph snapshot: no caching, no I/O,
//! and it never fails. A missing entry document yields a fixed placeholder.
//!
//! Steps, in order:
//! 1. inline the first `<link href>` reference to each stylesheet
//! 2. inline the first `<script src>` reference to each script
//! 3. rewrite image/font references to their data-URL payloads
//! 4. legacy-template projects: simulate the server directives and add a banner
//! 5. inject the diagnostic shim that feeds the event relay

mod composer;
pub mod legacy;
mod references;
pub mod shim;

pub use composer::{
    compose, compose_entry, Composer, MISSING_ENTRY_DOCUMENT, STOPPED_DOCUMENT,
};
pub use references::{
    inline_script, inline_stylesheet, rewrite_asset_references, strip_script_references,
    strip_stylesheet_references,
};
pub use shim::RelayTransport;
