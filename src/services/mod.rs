//! Services module - the core logic wrapping the winws executable.
//!
//! The services are **framework-agnostic** and have no dependencies on any
//! UI layer, making them testable and reusable.
//!
//! # Components
//!
//! - [`compiler`]: converts the active rules plus global toggles into one
//!   flat winws argument vector. Profile templates are parsed into a typed
//!   token representation; window-filter flags embedded in templates are
//!   stripped in favor of the single top-level declaration, and each rule's
//!   hostlist/ipset resource is substituted into its segment.
//!
//! - [`legacy`]: the alternate single-file path — extracts a command
//!   template from a found batch script, substitutes `%BIN%`/`%LISTS%`
//!   placeholders and splices the custom list into hostlist blocks.
//!
//! - [`resources`]: enumerates the domain-list and IP-set files on disk,
//!   with the validity check that keeps empty or comment-only files out of
//!   the compiled command.
//!
//! - [`supervisor`]: launches the compiled command, pumps its output into
//!   a structured event channel, enforces the memory ceiling, and tears
//!   the child down (gracefully, then forcibly).
//!
//! # Design Philosophy
//!
//! - **Pure**: the compiler is a function of its inputs; no ambient state
//! - **Async**: subprocess execution and monitoring use tokio
//! - **Testable**: all inputs are explicit parameters

pub mod compiler;
pub mod legacy;
pub mod resources;
pub mod supervisor;

pub use compiler::{CompileError, CompileOptions, CompiledCommand, compile};
pub use legacy::{LegacyError, LegacyOptions, compile_legacy, extract_args_template};
pub use resources::{ResourceRegistry, is_list_file_valid};
pub use supervisor::{
    EventSource, ProcessEvent, ProcessHandle, ProcessSupervisor, Severity, SupervisorError,
};
