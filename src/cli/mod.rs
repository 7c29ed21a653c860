//! Terminal commands. Each opens the configured database directly, so they
//! can run while the server is up (WAL mode).

pub mod doctor;
pub mod export;
pub mod import;
pub mod layout;
pub mod reset;
pub mod stats;
