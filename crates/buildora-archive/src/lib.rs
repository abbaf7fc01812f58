//! # buildora-archive
//!
//! Zip export and import for Buildora projects.
//!
//! - [`ArchiveComposer::structured`] mirrors the container tree into folders,
//!   decoding image and font payloads back to raw bytes.
//! - [`ArchiveComposer::merged`] produces one archive entry: the entry markup
//!   with its stylesheet and script inlined.
//! - [`import_zip`] and [`import_json`] rebuild a project from either format.
//! - [`DownloadSlot`] parks a finished archive until it is saved once.

mod download;
mod export;
mod import;

pub use download::{DownloadHandle, DownloadSlot};
pub use export::{merge_document, safe_archive_name, Archive, ArchiveComposer, ExportMode};
pub use import::{import_json, import_zip};
