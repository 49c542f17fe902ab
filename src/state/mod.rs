// State management module
//
// Wraps AppState with thread-safe access using Arc<RwLock<T>> and emits
// change events for UI updates. Background tasks never touch UI state
// directly; they go through here.

use crate::models::{AppState, LauncherSettings, RuleTable, UserConfig};
use camino::Utf8PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified.
///
/// Emitted so interested parties (primarily the GUI collaborator) learn
/// about state changes without polling.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// Directory configuration has been updated
    ConfigurationChanged { is_fully_configured: bool },

    /// The managed process has been launched
    ProcessStarted { pid: u32, rule_count: usize },

    /// The managed process has stopped (exited or was terminated)
    ProcessStopped { exit_code: Option<i32> },

    /// The rule table has been edited
    RulesChanged { rule_count: usize },

    /// Toggles or profile selection have been updated
    SettingsChanged,

    /// State has been reset
    StateReset,
}

/// Thread-safe state manager with event emission.
///
/// - Provides thread-safe access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// Always use `StateManager` instead of accessing [`AppState`] directly:
/// [`read()`](Self::read) for reads, [`update()`](Self::update) for
/// mutations with automatic event emission.
pub struct StateManager {
    /// The application state protected by RwLock for thread-safe access
    state: Arc<RwLock<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Get a read-only snapshot of the current state.
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Update the state and emit change events.
    ///
    /// Captures the old state, applies the update, diffs the two and emits
    /// the matching events.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);
        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(&self, old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.is_bin_dir_configured != new.is_bin_dir_configured
            || old.is_lists_dir_configured != new.is_lists_dir_configured
        {
            changes.push(StateChange::ConfigurationChanged {
                is_fully_configured: new.is_fully_configured(),
            });
        }

        if old.is_running != new.is_running {
            if new.is_running {
                changes.push(StateChange::ProcessStarted {
                    pid: new.child_pid.unwrap_or_default(),
                    rule_count: new.active_rule_indices.len(),
                });
            } else {
                changes.push(StateChange::ProcessStopped {
                    exit_code: new.last_exit_code,
                });
            }
        }

        if old.rule_table != new.rule_table {
            changes.push(StateChange::RulesChanged {
                rule_count: new.rule_table.len(),
            });
        }

        if old.selected_profile != new.selected_profile
            || old.game_filter_enabled != new.game_filter_enabled
            || old.use_ipset != new.use_ipset
            || old.use_custom_list != new.use_custom_list
            || old.custom_list_path != new.custom_list_path
            || old.debug_mode != new.debug_mode
        {
            changes.push(StateChange::SettingsChanged);
        }

        changes
    }

    // Convenience methods for common state updates

    /// Set the winws binary directory and update configuration status
    pub fn set_bin_dir(&self, path: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| {
            state.bin_dir = path.clone();
            state.is_bin_dir_configured = path.is_some();
        })
    }

    /// Set the lists directory and update configuration status
    pub fn set_lists_dir(&self, path: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| {
            state.lists_dir = path.clone();
            state.is_lists_dir_configured = path.is_some();
        })
    }

    /// Record a successful launch
    pub fn mark_process_started(&self, pid: u32, rule_indices: Vec<usize>) -> Vec<StateChange> {
        self.update(|state| {
            state.is_running = true;
            state.child_pid = Some(pid);
            state.active_rule_indices = rule_indices;
            state.last_exit_code = None;
        })
    }

    /// Record the managed process stopping
    pub fn mark_process_stopped(&self, exit_code: Option<i32>) -> Vec<StateChange> {
        self.update(|state| {
            state.is_running = false;
            state.child_pid = None;
            state.active_rule_indices.clear();
            state.last_exit_code = exit_code;
        })
    }

    /// Edit the rule table in place
    pub fn with_rules<F>(&self, edit: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut RuleTable),
    {
        self.update(|state| edit(&mut state.rule_table))
    }

    /// Update settings
    pub fn update_settings<F>(&self, settings_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        self.update(settings_fn)
    }

    /// Load configuration from UserConfig.
    ///
    /// Populates AppState from the user configuration file: directories,
    /// toggles, selected profile and the persisted rule table.
    pub fn load_from_user_config(&self, user_config: &UserConfig) -> Vec<StateChange> {
        self.update(|state| {
            let settings = &user_config.launcher_settings;

            if !settings.bin_dir.is_empty() {
                state.bin_dir = Some(Utf8PathBuf::from(&settings.bin_dir));
                state.is_bin_dir_configured = true;
            }
            if !settings.lists_dir.is_empty() {
                state.lists_dir = Some(Utf8PathBuf::from(&settings.lists_dir));
                state.is_lists_dir_configured = true;
            }
            if !settings.custom_list_txt.is_empty() {
                state.custom_list_path = Some(Utf8PathBuf::from(&settings.custom_list_txt));
            }

            state.selected_profile = settings.selected_profile.clone();
            state.game_filter_enabled = settings.game_filter;
            state.use_ipset = settings.use_ipset;
            state.use_custom_list = settings.use_custom_list;
            state.debug_mode = settings.debug_mode;
            state.rule_table = RuleTable::from_rules(settings.rules.clone());

            tracing::info!(
                "Loaded user config: bin_dir={}, lists_dir={}, rules={}, game_filter={}",
                state.is_bin_dir_configured,
                state.is_lists_dir_configured,
                state.rule_table.len(),
                state.game_filter_enabled
            );
        })
    }

    /// Export the current state as a UserConfig for persistence.
    ///
    /// The settings file is written on every mutating UI action and on
    /// close; this is the record that gets serialized.
    pub fn to_user_config(&self) -> UserConfig {
        self.read(|state| UserConfig {
            launcher_settings: LauncherSettings {
                selected_profile: state.selected_profile.clone(),
                game_filter: state.game_filter_enabled,
                use_ipset: state.use_ipset,
                use_custom_list: state.use_custom_list,
                custom_list_txt: state
                    .custom_list_path
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                bin_dir: state
                    .bin_dir
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                lists_dir: state
                    .lists_dir
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                rules: state.rule_table.rules().to_vec(),
                debug_mode: state.debug_mode,
            },
        })
    }

    /// Reset runtime state (keeps configuration)
    pub fn reset_runtime_state(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.is_running = false;
            state.child_pid = None;
            state.active_rule_indices.clear();
            state.last_exit_code = None;
        });

        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceKind, Rule};

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(!state.is_running);
        assert!(!state.is_fully_configured());
    }

    #[test]
    fn test_configuration_changes() {
        let manager = StateManager::new();

        let changes = manager.set_bin_dir(Some(Utf8PathBuf::from("/opt/winws/bin")));
        assert_eq!(
            changes,
            vec![StateChange::ConfigurationChanged {
                is_fully_configured: false
            }]
        );

        let changes = manager.set_lists_dir(Some(Utf8PathBuf::from("/opt/winws/lists")));
        assert_eq!(
            changes,
            vec![StateChange::ConfigurationChanged {
                is_fully_configured: true
            }]
        );
    }

    #[test]
    fn test_process_lifecycle_events() {
        let manager = StateManager::new();

        let changes = manager.mark_process_started(4242, vec![0, 2]);
        assert_eq!(
            changes,
            vec![StateChange::ProcessStarted {
                pid: 4242,
                rule_count: 2
            }]
        );
        assert!(manager.read(|s| s.is_running));

        let changes = manager.mark_process_stopped(Some(0));
        assert_eq!(
            changes,
            vec![StateChange::ProcessStopped { exit_code: Some(0) }]
        );
        assert!(!manager.read(|s| s.is_running));
        assert_eq!(manager.read(|s| s.last_exit_code), Some(0));
    }

    #[test]
    fn test_rule_edits_emit_events() {
        let manager = StateManager::new();

        let changes = manager.with_rules(|rules| {
            rules.add_rule(Rule::new(
                Some("list-general.txt".to_string()),
                Some(ResourceKind::List),
                "General",
            ));
        });

        assert_eq!(changes, vec![StateChange::RulesChanged { rule_count: 1 }]);
    }

    #[test]
    fn test_settings_change_detection() {
        let manager = StateManager::new();

        let changes = manager.update_settings(|state| {
            state.game_filter_enabled = true;
            state.selected_profile = "Discord".to_string();
        });

        assert_eq!(changes, vec![StateChange::SettingsChanged]);
    }

    #[test]
    fn test_user_config_round_trip() {
        let manager = StateManager::new();
        manager.set_bin_dir(Some(Utf8PathBuf::from("/opt/winws/bin")));
        manager.update_settings(|state| {
            state.game_filter_enabled = true;
        });
        manager.with_rules(|rules| {
            rules.add_rule(Rule::new(None, None, "Discord"));
        });

        let exported = manager.to_user_config();

        let restored = StateManager::new();
        restored.load_from_user_config(&exported);

        let state = restored.snapshot();
        assert_eq!(state.bin_dir, Some(Utf8PathBuf::from("/opt/winws/bin")));
        assert!(state.game_filter_enabled);
        assert_eq!(state.rule_table.len(), 1);
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.mark_process_started(1, vec![]);

        let event = rx.try_recv();
        assert!(matches!(event, Ok(StateChange::ProcessStarted { .. })));
    }

    #[test]
    fn test_clone_shares_state() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.update_settings(|state| {
            state.use_ipset = true;
        });

        assert!(manager2.read(|s| s.use_ipset));
    }
}
