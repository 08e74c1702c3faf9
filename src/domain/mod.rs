//! Domain value types shared across the repository, TM, scheduler and
//! sync subsystems. These are plain DTOs distinct from the SeaORM
//! entity `Model`s in `crate::db::entities` — the wire shape a caller
//! works with, not the storage shape.

pub mod hierarchy;
pub mod operation;
pub mod row;
pub mod tm;
pub mod trash;

pub use hierarchy::{EntityKind, HierarchyNode};
pub use operation::{OperationClass, OperationInfo};
pub use row::{NewRow, RowEdit};
pub use tm::{Tier, TmMatch};
pub use trash::TrashEntry;
