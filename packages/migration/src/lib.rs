//! Migration artifacts on disk and the applier that brings a database up to
//! date with them. The artifact contract is a migrations directory plus a
//! manifest enumerating the migrations; absence of either means there is
//! nothing to run.

pub mod apply;
pub mod store;

pub use apply::{apply_pending, ApplySummary, TRACKING_TABLE};
pub use store::{
    Manifest, ManifestEntry, MigrationSet, MigrationStore, PendingMigration, MANIFEST_FILE,
};
