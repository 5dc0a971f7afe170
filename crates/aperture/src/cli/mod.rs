//! Subcommand modules (§6 CLI shape): one module per top-level command
//! family, mirroring how the teacher split `process`/`models`/`config`.

pub mod config;
pub mod models;
pub mod phase;
pub mod stats;
