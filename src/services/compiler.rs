use crate::models::{Profile, ProfileStore, ResourceKind, Rule, WINWS_IMAGE_NAME};
use crate::services::resources::{ResourceRegistry, is_list_file_valid};
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// winws segment separator: arguments between two separators form one
/// independent filter configuration inside the tool.
pub const SEGMENT_SEPARATOR: &str = "--new";

/// Flag supplying a domain hostlist file to a segment.
pub const HOSTLIST_FLAG: &str = "hostlist";

/// Flag supplying an IP set file to a segment.
pub const IPSET_FLAG: &str = "ipset";

/// Window-filter flags (`--wf-tcp`, `--wf-udp`, ...) declare the top-level
/// port capture once per process; any occurrence inside a profile template
/// is stripped before splicing.
const WINDOW_FILTER_PREFIX: &str = "wf-";

/// Ports always captured for TCP / UDP.
pub const TCP_BASE_PORTS: &str = "80,443";
pub const UDP_BASE_PORTS: &str = "443,50000-50100";

/// High-port range appended when the game filter is enabled, and the value
/// substituted for `{GAME_FILTER}` (`0` matches nothing when disabled).
pub const GAME_FILTER_RANGE: &str = "1024-65535";
pub const GAME_FILTER_OFF: &str = "0";

/// The fully compiled winws invocation.
///
/// Derived, never persisted — recomputed from a snapshot of the rule table
/// and toggles on every launch. `rule_indices` records which rule table
/// entries produced segments, for status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCommand {
    pub executable: Utf8PathBuf,
    pub argv: Vec<String>,
    pub rule_indices: Vec<usize>,
}

/// Runtime toggles the compiler consumes.
///
/// Explicit struct rather than ambient state so the compiled output is a
/// pure function of its inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub game_filter_enabled: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompileError {
    #[error("winws executable not found under {0}")]
    ExecutableNotFound(Utf8PathBuf),
}

/// Failure to instantiate a single profile template. Fatal only to the rule
/// it occurred in; the multi-rule compiler skips that rule and continues.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unbalanced double quote in args template")]
    UnbalancedQuote,
}

/// Typed intermediate representation of a template argument.
///
/// Substitution and flag-stripping operate on these structured tokens, not
/// on raw text, so quoting cannot leak into downstream handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ArgToken {
    /// The `--new` segment separator.
    Separator,
    /// `--name` or `--name=value` (value already de-quoted).
    Flag { name: String, value: Option<String> },
    /// A positional word (only ever a value for the preceding flag).
    Bare(String),
}

/// Compile the enabled rules into one flat winws argument vector.
///
/// The output always starts with exactly one pair of top-level window
/// filter declarations, followed by one segment per enabled rule in rule
/// order, joined by [`SEGMENT_SEPARATOR`]. Rules are skipped — whole, never
/// partially — when their profile is unknown or its template fails to
/// tokenize; a missing or empty resource only drops the corresponding
/// hostlist/ipset flag from that rule's segment.
pub fn compile(
    rules: &[Rule],
    profiles: &ProfileStore,
    registry: &ResourceRegistry,
    bin_dir: &Utf8Path,
    options: &CompileOptions,
) -> Result<CompiledCommand, CompileError> {
    let (tcp_ports, udp_ports) = if options.game_filter_enabled {
        (
            format!("{},{}", TCP_BASE_PORTS, GAME_FILTER_RANGE),
            format!("{},{}", UDP_BASE_PORTS, GAME_FILTER_RANGE),
        )
    } else {
        (TCP_BASE_PORTS.to_string(), UDP_BASE_PORTS.to_string())
    };

    let mut argv = vec![
        format!("--wf-tcp={}", tcp_ports),
        format!("--wf-udp={}", udp_ports),
    ];
    let mut rule_indices = Vec::new();

    for (index, rule) in rules.iter().enumerate() {
        if !rule.is_enabled() {
            continue;
        }

        let Some(profile) = profiles.get(&rule.profile) else {
            tracing::error!(
                "Rule {} references unknown profile '{}', skipping",
                index,
                rule.profile
            );
            continue;
        };

        match build_rule_segment(rule, profile, registry, bin_dir, options.game_filter_enabled) {
            Ok(tokens) if tokens.is_empty() => {
                tracing::warn!("Rule {} compiled to an empty segment, skipping", index);
            }
            Ok(tokens) => {
                if !rule_indices.is_empty() {
                    argv.push(SEGMENT_SEPARATOR.to_string());
                }
                flatten_tokens(&tokens, &mut argv);
                rule_indices.push(index);
            }
            Err(e) => {
                tracing::error!(
                    "Rule {} (profile '{}') failed to compile: {}, skipping",
                    index,
                    rule.profile,
                    e
                );
            }
        }
    }

    let executable = bin_dir.join(WINWS_IMAGE_NAME);
    if !executable.is_file() {
        return Err(CompileError::ExecutableNotFound(bin_dir.to_path_buf()));
    }

    Ok(CompiledCommand {
        executable,
        argv,
        rule_indices,
    })
}

/// Instantiate one rule's profile template into its token sequence.
fn build_rule_segment(
    rule: &Rule,
    profile: &Profile,
    registry: &ResourceRegistry,
    bin_dir: &Utf8Path,
    game_filter_enabled: bool,
) -> Result<Vec<ArgToken>, TemplateError> {
    let game_filter = if game_filter_enabled {
        GAME_FILTER_RANGE
    } else {
        GAME_FILTER_OFF
    };

    let instantiated = profile
        .args_template
        .replace("{LISTS_DIR}", registry.lists_dir().as_str())
        .replace("{BIN_DIR}", bin_dir.as_str())
        .replace("{GAME_FILTER}", game_filter);

    let words = split_template_words(&instantiated)?;
    let mut tokens = parse_arg_tokens(words);

    // The window filters were already emitted once at the top level.
    tokens.retain(
        |t| !matches!(t, ArgToken::Flag { name, .. } if name.starts_with(WINDOW_FILTER_PREFIX)),
    );

    let hostlist = resolved_resource(rule, ResourceKind::List, registry);
    substitute_resource(&mut tokens, HOSTLIST_FLAG, hostlist);

    let ipset = resolved_resource(rule, ResourceKind::IpSet, registry);
    substitute_resource(&mut tokens, IPSET_FLAG, ipset);

    Ok(tokens)
}

/// Resolve the rule's resource of the given kind to a validated absolute
/// path, or `None` when absent, missing from disk, or empty/comment-only.
fn resolved_resource(
    rule: &Rule,
    kind: ResourceKind,
    registry: &ResourceRegistry,
) -> Option<Utf8PathBuf> {
    if rule.resource_kind != Some(kind) {
        return None;
    }
    let filename = rule.resource.as_deref()?;

    match registry.resolve(filename) {
        Some(path) if is_list_file_valid(&path) => Some(path),
        _ => {
            tracing::warn!(
                "Resource '{}' is missing or empty, omitting its flag",
                filename
            );
            None
        }
    }
}

/// Point every `flag_name` occurrence at `path`, appending the flag when the
/// template lacks one; with no path, remove the flag entirely. Matching is
/// by exact flag name, so `hostlist-exclude` never aliases `hostlist`.
fn substitute_resource(tokens: &mut Vec<ArgToken>, flag_name: &str, path: Option<Utf8PathBuf>) {
    match path {
        Some(path) => {
            let mut replaced = false;
            for token in tokens.iter_mut() {
                if let ArgToken::Flag { name, value } = token {
                    if name == flag_name {
                        *value = Some(path.to_string());
                        replaced = true;
                    }
                }
            }
            if !replaced {
                tokens.push(ArgToken::Flag {
                    name: flag_name.to_string(),
                    value: Some(path.into_string()),
                });
            }
        }
        None => {
            tokens.retain(|t| !matches!(t, ArgToken::Flag { name, .. } if name == flag_name));
        }
    }
}

/// Split an instantiated template into words, honoring double-quoted
/// substrings as single words (paths may contain spaces). Quote characters
/// themselves are consumed.
pub(crate) fn split_template_words(template: &str) -> Result<Vec<String>, TemplateError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;

    for ch in template.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    words.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }

    if in_quotes {
        return Err(TemplateError::UnbalancedQuote);
    }
    if pending {
        words.push(current);
    }

    Ok(words)
}

/// Parse words into the typed token IR.
///
/// `--flag=value` is split at the first `=`; a bare word directly after a
/// valueless flag is folded in as that flag's value (winws has no
/// positional arguments).
pub(crate) fn parse_arg_tokens(words: Vec<String>) -> Vec<ArgToken> {
    let mut tokens: Vec<ArgToken> = Vec::new();

    for word in words {
        if word == SEGMENT_SEPARATOR {
            tokens.push(ArgToken::Separator);
        } else if let Some(body) = word.strip_prefix("--") {
            let token = match body.split_once('=') {
                Some((name, value)) => ArgToken::Flag {
                    name: name.to_string(),
                    value: Some(value.to_string()),
                },
                None => ArgToken::Flag {
                    name: body.to_string(),
                    value: None,
                },
            };
            tokens.push(token);
        } else if let Some(ArgToken::Flag { value: value @ None, .. }) = tokens.last_mut() {
            *value = Some(word);
        } else {
            tokens.push(ArgToken::Bare(word));
        }
    }

    tokens
}

/// Flatten tokens into argv elements: `--flag value` two-token form, each
/// path one element regardless of embedded spaces.
pub(crate) fn flatten_tokens(tokens: &[ArgToken], argv: &mut Vec<String>) {
    for token in tokens {
        match token {
            ArgToken::Separator => argv.push(SEGMENT_SEPARATOR.to_string()),
            ArgToken::Flag { name, value } => {
                argv.push(format!("--{}", name));
                if let Some(value) = value {
                    argv.push(value.clone());
                }
            }
            ArgToken::Bare(word) => argv.push(word.clone()),
        }
    }
}
