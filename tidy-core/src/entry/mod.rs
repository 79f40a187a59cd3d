mod identity;
mod metadata;

pub(crate) use identity::device_id;
pub use identity::{DirIdentity, VisitedDirs};
pub use metadata::{DiscoveredEntry, EntryKind, EntryMetadata, extract, stat};
