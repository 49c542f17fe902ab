use crate::models::{MainConfig, UserConfig};
use crate::models::config::LauncherData;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two primary configuration files:
/// - Main config (`Launcher Main.yaml`): profile templates for the wrapped tool
/// - User config (`Launcher Config.yaml`): toggles, directories, rule table
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    main_config_path: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "Launcher Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            main_config_path: config_dir.join("Launcher Main.yaml"),
            user_config_path: config_dir.join("Launcher Config.yaml"),
            config_dir,
        })
    }

    /// Load the main configuration file.
    ///
    /// # Returns
    /// The loaded MainConfig, or the built-in defaults if the file doesn't exist
    pub fn load_main_config(&self) -> Result<MainConfig> {
        if !self.main_config_path.exists() {
            tracing::warn!(
                "Main config file not found at {}, using defaults",
                self.main_config_path
            );
            return Ok(Self::create_default_main_config());
        }

        let file_contents = fs::read_to_string(&self.main_config_path)
            .with_context(|| format!("Failed to read main config: {}", self.main_config_path))?;

        let config: MainConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse main config: {}", self.main_config_path))?;

        tracing::info!("Loaded main config from {}", self.main_config_path);
        Ok(config)
    }

    /// Save the main configuration file.
    pub fn save_main_config(&self, config: &MainConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize main config to YAML")?;

        fs::write(&self.main_config_path, yaml_string)
            .with_context(|| format!("Failed to write main config: {}", self.main_config_path))?;

        tracing::info!("Saved main config to {}", self.main_config_path);
        Ok(())
    }

    /// Load the user configuration file.
    ///
    /// # Returns
    /// The loaded UserConfig, or defaults if the file doesn't exist
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
            return Ok(UserConfig::default());
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Save the user configuration file.
    ///
    /// Called on every mutating UI action and on close, so the rule table
    /// and toggles survive restarts.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Create a default main configuration carrying the built-in profile set.
    ///
    /// These templates mirror the wrapped tool's published strategy presets.
    /// Each embeds its own `--wf-*` window-filter declarations exactly as the
    /// standalone presets do; the compiler strips those when splicing a
    /// profile into the multi-rule command.
    pub fn create_default_main_config() -> MainConfig {
        use indexmap::IndexMap;

        let mut profiles = IndexMap::new();

        profiles.insert(
            "General".to_string(),
            concat!(
                "--wf-tcp=80,443 --wf-udp=443,50000-50100 ",
                "--filter-udp=443 --hostlist=\"{LISTS_DIR}/list-general.txt\" ",
                "--dpi-desync=fake --dpi-desync-repeats=6 ",
                "--dpi-desync-fake-quic=\"{BIN_DIR}/quic_initial_www_google_com.bin\" ",
                "--new ",
                "--filter-tcp=80,443 --hostlist=\"{LISTS_DIR}/list-general.txt\" ",
                "--dpi-desync=fake,fakedsplit --dpi-desync-repeats=6 --dpi-desync-fooling=ts ",
                "--dpi-desync-fakedsplit-pattern=0x00 ",
                "--dpi-desync-fake-tls=\"{BIN_DIR}/tls_clienthello_www_google_com.bin\""
            )
            .to_string(),
        );

        profiles.insert(
            "General (ALT)".to_string(),
            concat!(
                "--wf-tcp=80,443 --wf-udp=443,50000-50100 ",
                "--filter-tcp=80,443 --hostlist=\"{LISTS_DIR}/list-general.txt\" ",
                "--dpi-desync=fake,multisplit --dpi-desync-split-pos=1 ",
                "--dpi-desync-autottl=2 --dpi-desync-repeats=8 ",
                "--dpi-desync-fake-tls=\"{BIN_DIR}/tls_clienthello_www_google_com.bin\""
            )
            .to_string(),
        );

        profiles.insert(
            "Discord".to_string(),
            concat!(
                "--wf-tcp=443 --wf-udp=443,50000-50100 ",
                "--filter-udp=50000-50100 --filter-l7=discord,stun ",
                "--dpi-desync=fake --dpi-desync-repeats=6 ",
                "--new ",
                "--filter-udp={GAME_FILTER} --dpi-desync=fake ",
                "--dpi-desync-any-protocol --dpi-desync-cutoff=d3"
            )
            .to_string(),
        );

        profiles.insert(
            "IPSet".to_string(),
            concat!(
                "--wf-tcp=80,443 --wf-udp=443 ",
                "--filter-tcp=80,443 --ipset=\"{LISTS_DIR}/ipset-all.txt\" ",
                "--dpi-desync=fake,fakedsplit --dpi-desync-repeats=6 --dpi-desync-fooling=ts ",
                "--dpi-desync-fake-tls=\"{BIN_DIR}/tls_clienthello_www_google_com.bin\""
            )
            .to_string(),
        );

        MainConfig {
            launcher_data: LauncherData {
                version: crate::VERSION.to_string(),
                profiles,
            },
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
