use crate::models::{Resource, ResourceKind};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// The distinguished aggregate IP set file.
pub const IPSET_ALL_FILENAME: &str = "ipset-all.txt";

/// Aggregated/custom list artifacts that are written by other components
/// and must never be offered as rule resources.
const EXCLUDED_FILENAMES: &[&str] = &["custom-list.txt", "list-exclude.txt", "ipset-exclude.txt"];

/// Enumerates the domain-list and IP-set files under the lists directory.
///
/// The directory is scanned once at construction and the result cached, so
/// repeated [`list_resources`](Self::list_resources) calls return a stable
/// ordering for the lifetime of the registry (the UI must not jitter).
/// [`refresh`](Self::refresh) rescans on demand.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    lists_dir: Utf8PathBuf,
    resources: Vec<Resource>,
}

impl ResourceRegistry {
    /// Scan `lists_dir` for `*.txt` resources.
    ///
    /// A missing or unreadable directory yields an empty registry rather
    /// than an error; resources appearing later are picked up by `refresh`.
    pub fn scan<P: AsRef<Utf8Path>>(lists_dir: P) -> Self {
        let lists_dir = lists_dir.as_ref().to_path_buf();
        let resources = Self::scan_dir(&lists_dir);

        tracing::debug!(
            "Scanned {}: {} resource(s) found",
            lists_dir,
            resources.len()
        );

        Self {
            lists_dir,
            resources,
        }
    }

    fn scan_dir(lists_dir: &Utf8Path) -> Vec<Resource> {
        let entries = match lists_dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to read lists directory {}: {}", lists_dir, e);
                return Vec::new();
            }
        };

        let mut resources = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension() != Some("txt") {
                continue;
            }

            let Some(filename) = path.file_name() else {
                continue;
            };
            if EXCLUDED_FILENAMES.contains(&filename) {
                continue;
            }

            let kind = if filename == IPSET_ALL_FILENAME {
                ResourceKind::IpSet
            } else {
                ResourceKind::List
            };

            resources.push(Resource {
                filename: filename.to_string(),
                kind,
                display: display_label(filename),
            });
        }

        resources
    }

    /// Rescan the lists directory, replacing the cached listing.
    pub fn refresh(&mut self) {
        self.resources = Self::scan_dir(&self.lists_dir);
    }

    /// All known resources, in scan order.
    pub fn list_resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Absolute path for a resource filename, if the file currently exists.
    ///
    /// A resource that has disappeared from disk resolves to `None`; the
    /// compiler treats that the same as an invalid file and drops the flag.
    pub fn resolve(&self, filename: &str) -> Option<Utf8PathBuf> {
        let path = self.lists_dir.join(filename);
        path.is_file().then_some(path)
    }

    pub fn lists_dir(&self) -> &Utf8Path {
        &self.lists_dir
    }
}

/// Whether a list/ipset file is usable as a winws argument.
///
/// The file must exist, be nonzero-length, and contain at least one
/// non-blank line that is not a `#` comment. Empty or comment-only files
/// are treated as absent so the compiler never passes winws a hostlist or
/// ipset flag pointing at a file the tool would mis-parse.
pub fn is_list_file_valid(path: &Utf8Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() || metadata.len() == 0 {
        return false;
    }

    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };

    contents
        .lines()
        .any(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
}

/// Human display label for a list filename.
///
/// `list-general.txt` → "General", `ipset-all.txt` → "All",
/// `list-youtube-alt.txt` → "Youtube Alt".
fn display_label(filename: &str) -> String {
    let stem = filename.strip_suffix(".txt").unwrap_or(filename);
    let stem = stem
        .strip_prefix("list-")
        .or_else(|| stem.strip_prefix("ipset-"))
        .unwrap_or(stem);

    stem.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::try_from(dir.path().join(name)).unwrap();
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{}", contents).unwrap();
        path
    }

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_scan_classifies_and_excludes() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "list-general.txt", "example.com\n");
        write_file(&dir, "ipset-all.txt", "1.2.3.4\n");
        write_file(&dir, "custom-list.txt", "example.com\n");
        write_file(&dir, "list-exclude.txt", "example.com\n");
        write_file(&dir, "notes.md", "not a list\n");

        let registry = ResourceRegistry::scan(utf8_dir(&dir));
        let resources = registry.list_resources();

        assert_eq!(resources.len(), 2);
        let general = resources
            .iter()
            .find(|r| r.filename == "list-general.txt")
            .unwrap();
        assert_eq!(general.kind, ResourceKind::List);
        assert_eq!(general.display, "General");

        let ipset = resources
            .iter()
            .find(|r| r.filename == "ipset-all.txt")
            .unwrap();
        assert_eq!(ipset.kind, ResourceKind::IpSet);
    }

    #[test]
    fn test_listing_is_stable_across_calls() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "list-a.txt", "a.com\n");
        write_file(&dir, "list-b.txt", "b.com\n");
        write_file(&dir, "list-c.txt", "c.com\n");

        let registry = ResourceRegistry::scan(utf8_dir(&dir));
        let first: Vec<String> = registry
            .list_resources()
            .iter()
            .map(|r| r.filename.clone())
            .collect();
        let second: Vec<String> = registry
            .list_resources()
            .iter()
            .map(|r| r.filename.clone())
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_directory_yields_empty_registry() {
        let dir = TempDir::new().unwrap();
        let missing = utf8_dir(&dir).join("no-such-dir");

        let registry = ResourceRegistry::scan(&missing);
        assert!(registry.list_resources().is_empty());
        assert!(registry.resolve("list-general.txt").is_none());
    }

    #[test]
    fn test_resolve_requires_file_to_exist() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "list-general.txt", "example.com\n");

        let registry = ResourceRegistry::scan(utf8_dir(&dir));
        assert!(registry.resolve("list-general.txt").is_some());
        assert!(registry.resolve("list-vanished.txt").is_none());
    }

    #[test]
    fn test_refresh_picks_up_new_files() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "list-a.txt", "a.com\n");

        let mut registry = ResourceRegistry::scan(utf8_dir(&dir));
        assert_eq!(registry.list_resources().len(), 1);

        write_file(&dir, "list-b.txt", "b.com\n");
        assert_eq!(registry.list_resources().len(), 1);

        registry.refresh();
        assert_eq!(registry.list_resources().len(), 2);
    }

    #[test]
    fn test_validity_check() {
        let dir = TempDir::new().unwrap();

        let valid = write_file(&dir, "valid.txt", "# header\nexample.com\n");
        let empty = write_file(&dir, "empty.txt", "");
        let comments_only = write_file(&dir, "comments.txt", "# one\n\n  # two\n");
        let missing = utf8_dir(&dir).join("missing.txt");

        assert!(is_list_file_valid(&valid));
        assert!(!is_list_file_valid(&empty));
        assert!(!is_list_file_valid(&comments_only));
        assert!(!is_list_file_valid(&missing));
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(display_label("list-general.txt"), "General");
        assert_eq!(display_label("list-youtube-alt.txt"), "Youtube Alt");
        assert_eq!(display_label("ipset-all.txt"), "All");
        assert_eq!(display_label("my_lists.txt"), "My Lists");
    }
}
