//! winws-launcher - orchestration shell for the winws DPI-circumvention tool
//!
//! Headless entry point. It initializes:
//! - Logging infrastructure (file rotation + console output)
//! - Tokio async runtime (4 worker threads for subprocess supervision)
//! - State management ([`StateManager`])
//! - Configuration loading ([`ConfigManager`])
//!
//! # Execution Flow
//!
//! 1. Initialize logging → logs/launcher_<date>.log
//! 2. Create tokio runtime with 4 worker threads
//! 3. Load YAML configurations from Launcher Data/
//!    - Launcher Main.yaml → profile templates
//!    - Launcher Config.yaml → toggles, directories, rule table
//! 4. Stop any orphaned winws children from a previous run
//! 5. Compile the active rules and launch the supervised child
//! 6. Forward process events to the log until Ctrl-C
//! 7. Terminate the child and persist settings
//!
//! The GUI frontend is a separate collaborator: it drives the same
//! [`StateManager`] and supervisor event channel this binary wires up.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::sync::Arc;
use winws_launcher::models::{ProfileStore, WINWS_IMAGE_NAME};
use winws_launcher::services::compiler::{self, CompileOptions};
use winws_launcher::services::resources::ResourceRegistry;
use winws_launcher::services::supervisor::ProcessSupervisor;
use winws_launcher::{APP_NAME, ConfigManager, StateManager, VERSION};

fn main() -> Result<()> {
    // Setup logging with both file and console output
    let _guard = winws_launcher::logging::setup_logging_with_console("logs", "launcher", false, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("launcher-worker")
        .build()?;

    let state_manager = Arc::new(StateManager::new());

    let config_manager = ConfigManager::new("Launcher Data")?;
    let main_config = config_manager.load_main_config()?;
    let user_config = config_manager.load_user_config()?;

    let profiles = ProfileStore::from_templates(&main_config.launcher_data.profiles);
    tracing::info!("Loaded {} profile template(s)", profiles.len());

    state_manager.load_from_user_config(&user_config);

    // Fall back to the distribution layout when directories are unset
    if !state_manager.read(|s| s.is_fully_configured()) {
        state_manager.set_bin_dir(Some(Utf8PathBuf::from("bin")));
        state_manager.set_lists_dir(Some(Utf8PathBuf::from("lists")));
        tracing::info!("Directories not configured, using ./bin and ./lists");
    }

    let result = runtime.block_on(run(&state_manager, &profiles));

    // Persist settings on close
    if let Err(e) = config_manager.save_user_config(&state_manager.to_user_config()) {
        tracing::error!("Failed to save settings: {}", e);
    }

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result
}

async fn run(state_manager: &StateManager, profiles: &ProfileStore) -> Result<()> {
    // Recover from orphaned children of a previous run
    if ProcessSupervisor::is_running(WINWS_IMAGE_NAME) {
        let stopped = ProcessSupervisor::stop_all(WINWS_IMAGE_NAME);
        tracing::warn!("Stopped {} orphaned winws process(es)", stopped);
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }

    let (rules, bin_dir, lists_dir, game_filter) = state_manager.read(|s| {
        (
            s.rule_table.rules().to_vec(),
            s.bin_dir.clone().unwrap_or_else(|| Utf8PathBuf::from("bin")),
            s.lists_dir
                .clone()
                .unwrap_or_else(|| Utf8PathBuf::from("lists")),
            s.game_filter_enabled,
        )
    });

    let registry = ResourceRegistry::scan(&lists_dir);
    tracing::info!(
        "Found {} list resource(s) under {}",
        registry.list_resources().len(),
        lists_dir
    );

    let command = compiler::compile(
        &rules,
        profiles,
        &registry,
        &bin_dir,
        &CompileOptions {
            game_filter_enabled: game_filter,
        },
    )
    .context("Failed to compile winws command")?;

    tracing::info!(
        "Compiled command: {} argument(s), {} active rule(s)",
        command.argv.len(),
        command.rule_indices.len()
    );

    let supervisor = ProcessSupervisor::new();
    let mut events = supervisor.subscribe();

    let work_dir = lists_dir
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| Utf8PathBuf::from("."));

    let handle = supervisor
        .launch(&command, &work_dir)
        .await
        .context("Failed to launch winws")?;
    state_manager.mark_process_started(handle.pid, handle.rule_indices.clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, stopping");
                supervisor.terminate().await;
                state_manager.mark_process_stopped(None);
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        use winws_launcher::services::supervisor::Severity;
                        match event.severity {
                            Severity::Info => tracing::info!("[{:?}] {}", event.source, event.message),
                            Severity::Warning => tracing::warn!("[{:?}] {}", event.source, event.message),
                            Severity::Error => tracing::error!("[{:?}] {}", event.source, event.message),
                        }

                        if event.message.starts_with("process finished") {
                            state_manager.mark_process_stopped(None);
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Event channel closed: {}", e);
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
