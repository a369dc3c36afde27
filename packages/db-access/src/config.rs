//! Environment-driven configuration for orchestrator entry points, plus the
//! identifier validation applied before a database name is embedded in SQL.

use std::env;

use crate::error::DbError;
use crate::provider::{DatabaseIdentity, DevModeConfig};

/// Administrative database that is always present and safe to connect to
/// while the target database may not exist yet.
pub const DEFAULT_OPERATIONAL_DATABASE: &str = "postgres";

/// Builds the target-database identity from the environment.
///
/// Production (facade) deployments must provide the remote resource and
/// secret references; development mode only needs the database name.
pub fn identity_from_env() -> Result<DatabaseIdentity, DbError> {
    let database = must_var("DATABASE_NAME")?;
    if development_mode() {
        Ok(DatabaseIdentity::named(database))
    } else {
        let resource_ref = must_var("DATABASE_RESOURCE_REF")?;
        let secret_ref = must_var("DATABASE_SECRET_REF")?;
        Ok(DatabaseIdentity::remote(database, resource_ref, secret_ref))
    }
}

pub fn dev_from_env() -> DevModeConfig {
    DevModeConfig {
        connection_string: env::var("DATABASE_URL").ok(),
        development_mode: development_mode(),
    }
}

pub fn operational_database_from_env() -> String {
    env::var("OPERATIONAL_DATABASE").unwrap_or_else(|_| DEFAULT_OPERATIONAL_DATABASE.to_string())
}

fn development_mode() -> bool {
    matches!(
        env::var("DEVELOPMENT_MODE").as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

/// Get required environment variable or return a configuration error.
fn must_var(name: &str) -> Result<String, DbError> {
    env::var(name)
        .map_err(|_| DbError::config(format!("required environment variable '{name}' is not set")))
}

/// Accepts the conservative identifier charset we embed in catalog probes
/// and CREATE DATABASE statements.
pub fn validate_identifier(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let tail_ok = name
        .chars()
        .skip(1)
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !head_ok || !tail_ok {
        return Err(DbError::config(format!(
            "'{name}' is not a valid database identifier"
        )));
    }
    Ok(())
}
