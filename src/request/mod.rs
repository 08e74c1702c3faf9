//! The request surface (spec §6): thin async functions grouped by
//! resource, each taking `(&CoreContext, &Principal, ...)`. No
//! transport or wire format is specified here — an HTTP/RPC layer
//! sits behind this module, not inside it.

pub mod file;
pub mod hierarchy;
pub mod offline;
pub mod ops;
pub mod row;
pub mod sync;
pub mod tm;
