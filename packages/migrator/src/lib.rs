//! Provisioning-and-migration orchestrator: verifies migration artifacts,
//! ensures the target database exists, applies migrations with retry, and
//! reports a result suitable for a serverless function response.

pub mod hooks;
pub mod orchestrator;
pub mod result;

pub use hooks::{DbContext, MigrationHooks};
pub use orchestrator::{Migrator, DEFAULT_MIGRATIONS_DIR};
pub use result::MigrationResult;
