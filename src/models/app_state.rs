use crate::models::rule::RuleTable;
use camino::Utf8PathBuf;

/// Image name of the wrapped DPI-circumvention executable.
///
/// Used to resolve the binary under the bin directory and to find orphaned
/// children by exact process name after a launcher restart.
pub const WINWS_IMAGE_NAME: &str = "winws.exe";

/// Single source of truth for all application state.
///
/// Wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`] for
/// thread-safe access. Never mutate directly — always go through
/// [`StateManager`](crate::state::StateManager) so change events fire.
///
/// The rule table and settings are mutated only from the foreground thread;
/// the compiled command and process handle are owned by the
/// [`ProcessSupervisor`](crate::services::supervisor::ProcessSupervisor)
/// once a launch succeeds.
#[derive(Clone, Debug)]
pub struct AppState {
    // Directory configuration
    pub bin_dir: Option<Utf8PathBuf>,
    pub lists_dir: Option<Utf8PathBuf>,
    pub custom_list_path: Option<Utf8PathBuf>,

    // Configuration validity flags
    pub is_bin_dir_configured: bool,
    pub is_lists_dir_configured: bool,

    // Launch selection
    pub selected_profile: String,
    pub rule_table: RuleTable,

    // Global toggles
    pub game_filter_enabled: bool,
    pub use_ipset: bool,
    pub use_custom_list: bool,

    // Runtime state
    pub is_running: bool,
    pub child_pid: Option<u32>,
    pub active_rule_indices: Vec<usize>,
    pub last_exit_code: Option<i32>,

    // Settings
    pub debug_mode: bool,
}

impl AppState {
    /// Both directories must be known before anything can launch.
    pub fn is_fully_configured(&self) -> bool {
        self.is_bin_dir_configured && self.is_lists_dir_configured
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            bin_dir: None,
            lists_dir: None,
            custom_list_path: None,
            is_bin_dir_configured: false,
            is_lists_dir_configured: false,
            selected_profile: "General".to_string(),
            rule_table: RuleTable::new(),
            game_filter_enabled: false,
            use_ipset: false,
            use_custom_list: false,
            is_running: false,
            child_pid: None,
            active_rule_indices: Vec::new(),
            last_exit_code: None,
            debug_mode: false,
        }
    }
}
