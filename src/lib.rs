//! Localization Data Manager core
//!
//! A multi-user server for translatable string rows organized into a
//! platform/project/folder/file/row hierarchy, with translation-memory
//! search and pre-translation, a background operation scheduler with a
//! live progress bus, and an offline sync engine for a desktop client's
//! local sandbox.

pub mod audit;
pub mod config;
pub mod context;
pub mod db;
pub mod domain;
pub mod error;
pub mod jobs;
pub mod principal;
pub mod repository;
pub mod request;
pub mod sync;
pub mod tm;

pub use context::CoreContext;
pub use error::{Error, Result};
