//! Test doubles and logging helpers shared by the workspace's test suites.

pub mod facade;
pub mod logging;

pub use facade::{CallKind, FacadeCall, ScriptedFacade};
