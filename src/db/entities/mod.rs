//! SeaORM entity definitions mapping the spec §3 data model to tables.
//! Both backends (authoritative and local) share these definitions.

pub mod audit_event;
pub mod file;
pub mod folder;
pub mod operation;
pub mod platform;
pub mod project;
pub mod row;
pub mod session;
pub mod sync_subscription;
pub mod tm;
pub mod tm_entry;
pub mod trash_item;

pub use audit_event::Entity as AuditEvent;
pub use file::Entity as File;
pub use folder::Entity as Folder;
pub use operation::Entity as Operation;
pub use platform::Entity as Platform;
pub use project::Entity as Project;
pub use row::Entity as Row;
pub use session::Entity as Session;
pub use sync_subscription::Entity as SyncSubscription;
pub use tm::Entity as Tm;
pub use tm_entry::Entity as TmEntry;
pub use trash_item::Entity as TrashItem;
