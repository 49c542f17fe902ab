use crate::models::rule::Rule;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Main configuration from Launcher Main.yaml
///
/// Contains the profile templates the compiler can instantiate. Written out
/// with the built-in preset set when the file does not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    #[serde(rename = "Launcher_Data")]
    pub launcher_data: LauncherData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherData {
    pub version: String,

    /// Profile name → args template, in declaration order.
    #[serde(rename = "Profiles")]
    pub profiles: IndexMap<String, String>,
}

/// User configuration from Launcher Config.yaml
///
/// Contains user-specific settings, toggles and the persisted rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "Launcher_Settings")]
    pub launcher_settings: LauncherSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherSettings {
    #[serde(rename = "Selected Profile", default = "default_selected_profile")]
    pub selected_profile: String,

    #[serde(rename = "Game Filter", default)]
    pub game_filter: bool,

    #[serde(rename = "Use IPSet", default)]
    pub use_ipset: bool,

    #[serde(rename = "Use Custom List", default)]
    pub use_custom_list: bool,

    #[serde(rename = "Custom List TXT", default)]
    pub custom_list_txt: String,

    #[serde(rename = "Bin Dir", default)]
    pub bin_dir: String,

    #[serde(rename = "Lists Dir", default)]
    pub lists_dir: String,

    #[serde(rename = "Rules", default)]
    pub rules: Vec<Rule>,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            selected_profile: default_selected_profile(),
            game_filter: false,
            use_ipset: false,
            use_custom_list: false,
            custom_list_txt: String::new(),
            bin_dir: String::new(),
            lists_dir: String::new(),
            rules: Vec::new(),
            debug_mode: false,
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            launcher_settings: LauncherSettings::default(),
        }
    }
}

fn default_selected_profile() -> String {
    "General".to_string()
}
