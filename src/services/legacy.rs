use crate::services::compiler::{
    ArgToken, HOSTLIST_FLAG, IPSET_FLAG, SEGMENT_SEPARATOR, TemplateError, flatten_tokens,
    parse_arg_tokens, split_template_words,
};
use crate::services::resources::is_list_file_valid;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use thiserror::Error;

/// Toggles consumed by the legacy single-file path.
#[derive(Debug, Clone, Default)]
pub struct LegacyOptions {
    pub use_custom_list: bool,
    pub custom_list_path: Option<Utf8PathBuf>,
    pub use_ipset: bool,
}

#[derive(Error, Debug)]
pub enum LegacyError {
    #[error("no winws invocation found in script")]
    CommandNotFound,

    #[error("failed to read script {path}: {source}")]
    ScriptRead {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Find the first batch script in `dir` that invokes winws.
///
/// Entries are visited in filename order so repeated calls pick the same
/// script when several are present.
pub fn find_launch_script(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let entries = dir.read_dir_utf8().ok()?;

    let mut scripts: Vec<Utf8PathBuf> = entries
        .flatten()
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| {
            matches!(
                path.extension().map(|ext| ext.to_ascii_lowercase()),
                Some(ext) if ext == "bat" || ext == "cmd"
            )
        })
        .collect();
    scripts.sort();

    scripts.into_iter().find(|path| {
        fs::read_to_string(path)
            .map(|body| body.to_lowercase().contains("winws.exe"))
            .unwrap_or(false)
    })
}

/// Extract the winws argument template out of a batch script body.
///
/// Caret line continuations are joined first, then the arguments after the
/// `winws.exe` reference on the invoking line are taken verbatim (still
/// carrying `%BIN%`/`%LISTS%` placeholders and quoting).
pub fn extract_args_template(script: &str) -> Result<String, LegacyError> {
    let invocation = Regex::new(r#"(?i)winws\.exe"?\s+(.+)$"#).expect("Invalid invocation regex");

    for line in join_continuations(script) {
        if let Some(captures) = invocation.captures(&line) {
            let args = captures[1].trim().to_string();
            if !args.is_empty() {
                return Ok(args);
            }
        }
    }

    Err(LegacyError::CommandNotFound)
}

/// Join `^`-continued batch lines into logical lines.
fn join_continuations(script: &str) -> Vec<String> {
    let mut logical = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        let trimmed = line.trim_end();
        if let Some(stripped) = trimmed.strip_suffix('^') {
            current.push_str(stripped);
            current.push(' ');
        } else {
            current.push_str(trimmed);
            logical.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        logical.push(current);
    }

    logical
}

/// Compile an extracted template into an argument vector.
///
/// `%BIN%` and `%LISTS%` are substituted with the actual directories, the
/// result is tokenized and split into `--new` blocks; blocks carrying a
/// hostlist flag get the custom list appended when it is enabled and valid,
/// and `--ipset` blocks are dropped when the ipset toggle is off.
///
/// Unlike the multi-rule compiler this path is all-or-nothing: a tokenize
/// failure aborts the whole compilation.
pub fn compile_legacy(
    template: &str,
    bin_dir: &Utf8Path,
    lists_dir: &Utf8Path,
    options: &LegacyOptions,
) -> Result<Vec<String>, LegacyError> {
    let instantiated = template
        .replace("%BIN%", &format!("{}/", bin_dir))
        .replace("%LISTS%", &format!("{}/", lists_dir));

    let words = split_template_words(&instantiated)?;
    let tokens = parse_arg_tokens(words);

    let custom_list = if options.use_custom_list {
        options
            .custom_list_path
            .as_deref()
            .filter(|path| is_list_file_valid(path))
    } else {
        None
    };
    if options.use_custom_list && custom_list.is_none() {
        tracing::warn!("Custom list is enabled but missing or empty, not appending");
    }

    let mut blocks: Vec<Vec<ArgToken>> = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        if token == ArgToken::Separator {
            blocks.push(std::mem::take(&mut current));
        } else {
            current.push(token);
        }
    }
    blocks.push(current);

    let mut argv = Vec::new();
    let mut emitted = 0usize;
    for mut block in blocks {
        if block.is_empty() {
            continue;
        }

        if !options.use_ipset && block_has_flag(&block, IPSET_FLAG) {
            tracing::debug!("Dropping ipset block (ipset toggle off)");
            continue;
        }

        if let Some(custom) = custom_list {
            if block_has_flag(&block, HOSTLIST_FLAG) {
                block.push(ArgToken::Flag {
                    name: HOSTLIST_FLAG.to_string(),
                    value: Some(custom.to_string()),
                });
            }
        }

        if emitted > 0 {
            argv.push(SEGMENT_SEPARATOR.to_string());
        }
        flatten_tokens(&block, &mut argv);
        emitted += 1;
    }

    Ok(argv)
}

fn block_has_flag(block: &[ArgToken], flag_name: &str) -> bool {
    block
        .iter()
        .any(|t| matches!(t, ArgToken::Flag { name, .. } if name == flag_name))
}

/// Convenience wrapper: read a script from disk and compile it.
pub fn compile_script(
    script_path: &Utf8Path,
    bin_dir: &Utf8Path,
    lists_dir: &Utf8Path,
    options: &LegacyOptions,
) -> Result<Vec<String>, LegacyError> {
    let body = fs::read_to_string(script_path).map_err(|source| LegacyError::ScriptRead {
        path: script_path.to_path_buf(),
        source,
    })?;

    let template = extract_args_template(&body)?;
    compile_legacy(&template, bin_dir, lists_dir, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const SCRIPT: &str = concat!(
        "@echo off\r\n",
        "chcp 65001 > nul\r\n",
        "start \"winws\" /min \"%BIN%winws.exe\" --wf-tcp=80,443 ^\r\n",
        "--filter-tcp=80,443 --hostlist=\"%LISTS%list-general.txt\" --dpi-desync=fake ^\r\n",
        "--new --filter-udp=443 --ipset=\"%LISTS%ipset-all.txt\" --dpi-desync=fake\r\n",
    );

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_extract_joins_continuations() {
        let template = extract_args_template(SCRIPT).unwrap();
        assert!(template.starts_with("--wf-tcp=80,443"));
        assert!(template.contains("--new"));
        assert!(template.contains("%LISTS%list-general.txt"));
    }

    #[test]
    fn test_extract_without_invocation() {
        let err = extract_args_template("@echo off\nexit /b 0\n").unwrap_err();
        assert!(matches!(err, LegacyError::CommandNotFound));
    }

    #[test]
    fn test_compile_substitutes_dirs_and_splits_blocks() {
        let template = extract_args_template(SCRIPT).unwrap();
        let argv = compile_legacy(
            &template,
            Utf8Path::new("/opt/bin"),
            Utf8Path::new("/opt/lists"),
            &LegacyOptions {
                use_ipset: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(argv.contains(&"--hostlist".to_string()));
        assert!(argv.contains(&"/opt/lists/list-general.txt".to_string()));
        assert!(argv.contains(&"/opt/lists/ipset-all.txt".to_string()));
        assert_eq!(
            argv.iter().filter(|a| *a == SEGMENT_SEPARATOR).count(),
            1
        );
    }

    #[test]
    fn test_compile_drops_ipset_blocks_when_toggled_off() {
        let template = extract_args_template(SCRIPT).unwrap();
        let argv = compile_legacy(
            &template,
            Utf8Path::new("/opt/bin"),
            Utf8Path::new("/opt/lists"),
            &LegacyOptions::default(),
        )
        .unwrap();

        assert!(!argv.contains(&"--ipset".to_string()));
        assert!(!argv.contains(&SEGMENT_SEPARATOR.to_string()));
    }

    #[test]
    fn test_compile_appends_valid_custom_list_to_hostlist_blocks() {
        let dir = TempDir::new().unwrap();
        let custom = utf8_dir(&dir).join("custom-list.txt");
        let mut file = fs::File::create(&custom).unwrap();
        writeln!(file, "example.com").unwrap();

        let template = extract_args_template(SCRIPT).unwrap();
        let argv = compile_legacy(
            &template,
            Utf8Path::new("/opt/bin"),
            Utf8Path::new("/opt/lists"),
            &LegacyOptions {
                use_custom_list: true,
                custom_list_path: Some(custom.clone()),
                use_ipset: true,
            },
        )
        .unwrap();

        // Appended once: the hostlist block gains it, the ipset block does not
        assert_eq!(argv.iter().filter(|a| a.as_str() == custom.as_str()).count(), 1);
    }

    #[test]
    fn test_compile_skips_empty_or_invalid_custom_list() {
        let dir = TempDir::new().unwrap();
        let custom = utf8_dir(&dir).join("custom-list.txt");
        fs::File::create(&custom).unwrap();

        let template = extract_args_template(SCRIPT).unwrap();
        let argv = compile_legacy(
            &template,
            Utf8Path::new("/opt/bin"),
            Utf8Path::new("/opt/lists"),
            &LegacyOptions {
                use_custom_list: true,
                custom_list_path: Some(custom.clone()),
                use_ipset: true,
            },
        )
        .unwrap();

        assert!(!argv.iter().any(|a| a.as_str() == custom.as_str()));
    }

    #[test]
    fn test_compile_aborts_on_unbalanced_quote() {
        let err = compile_legacy(
            "--hostlist=\"%LISTS%broken.txt",
            Utf8Path::new("/opt/bin"),
            Utf8Path::new("/opt/lists"),
            &LegacyOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            LegacyError::Template(TemplateError::UnbalancedQuote)
        ));
    }

    #[test]
    fn test_compile_script_from_disk() {
        let dir = TempDir::new().unwrap();
        let script_path = utf8_dir(&dir).join("general.bat");
        fs::write(&script_path, SCRIPT).unwrap();

        let argv = compile_script(
            &script_path,
            Utf8Path::new("/opt/bin"),
            Utf8Path::new("/opt/lists"),
            &LegacyOptions {
                use_ipset: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(argv.contains(&"/opt/lists/list-general.txt".to_string()));

        let missing = utf8_dir(&dir).join("missing.bat");
        let err = compile_script(
            &missing,
            Utf8Path::new("/opt/bin"),
            Utf8Path::new("/opt/lists"),
            &LegacyOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LegacyError::ScriptRead { .. }));
    }

    #[test]
    fn test_find_launch_script() {
        let dir = TempDir::new().unwrap();
        let dir_path = utf8_dir(&dir);

        fs::write(dir_path.join("readme.txt"), "nothing").unwrap();
        fs::write(dir_path.join("stop.bat"), "taskkill /IM other.exe").unwrap();
        fs::write(dir_path.join("general.bat"), SCRIPT).unwrap();

        let found = find_launch_script(&dir_path).unwrap();
        assert_eq!(found.file_name(), Some("general.bat"));

        let empty = TempDir::new().unwrap();
        assert!(find_launch_script(&utf8_dir(&empty)).is_none());
    }
}
