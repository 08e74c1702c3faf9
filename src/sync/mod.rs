//! Offline sync engine (spec §4.4): subscriptions, initial snapshot
//! and delta pull from the authoritative store into the local
//! sandbox, promotion of local edits back, and cross-store trash
//! management.

pub mod offline;
pub mod pull;
pub mod push;
pub mod subscription;

pub use offline::{empty_recycle_bin, EmptyTrashReport};
pub use pull::{auto_open_pull, pull_delta, pull_initial_snapshot, PullSummary};
pub use push::{upload_to_central, UploadSummary};
