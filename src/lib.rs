//! MBO record transcoder library.
//!
//! This crate provides the types and logic used by the `mbo_lines` converter
//! binary and the `inspect` tool:
//!
//! - `record`: decoded record schema (every field optional) and capture frames
//! - `side`: side-indicator resolution to bid/ask
//! - `normalize`: order-event classification and field extraction
//! - `event`: canonical ADD/MOD/CXL/TRD/CLR events and their line format
//! - `capture`: length + CRC32 framed capture reader/writer
//! - `pipeline`: order-preserving record-to-line driver with a writer thread
//!
//! The binaries (`src/main.rs` and `src/bin/inspect.rs`) wire these modules
//! to the command line.
pub mod capture;
pub mod event;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod side;
