//! Data models for the launcher.
//!
//! This module contains the core data structures used throughout the
//! application:
//! - [`AppState`]: the central state container holding directories, toggles
//!   and runtime status
//! - [`Profile`]/[`ProfileStore`]: named args templates for the wrapped tool
//! - [`Rule`]/[`RuleTable`]: the ordered (resource, profile) pairings the
//!   compiler turns into command segments
//! - [`Resource`]/[`ResourceKind`]: list files found on disk
//! - [`MainConfig`]/[`UserConfig`]: YAML-backed configuration records
//!
//! # Architecture Note
//!
//! Config structs derive `Serialize`/`Deserialize` for YAML persistence.
//! `AppState` is wrapped in `Arc<RwLock<>>` by
//! [`StateManager`](crate::state::StateManager); updates go through its
//! `update()` method so change events fire consistently.

pub mod app_state;
pub mod config;
pub mod profile;
pub mod resource;
pub mod rule;

pub use app_state::{AppState, WINWS_IMAGE_NAME};
pub use config::{LauncherSettings, MainConfig, UserConfig};
pub use profile::{DISABLED_PROFILE, Profile, ProfileStore};
pub use resource::{Resource, ResourceKind};
pub use rule::{Rule, RuleChange, RuleTable, RuleTableError};
