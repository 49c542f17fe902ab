use serde::{Deserialize, Serialize};

/// Classification of a list file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Plain-text domain hostlist, one domain per line.
    List,
    /// IP set, one IP literal or CIDR per line.
    IpSet,
}

/// A domain-list or IP-set file the registry found on disk.
///
/// The filename is the stable identity; the display label is derived for
/// the UI. A resource may vanish from disk after the scan — consumers must
/// treat that as "missing", never as a crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub filename: String,
    pub kind: ResourceKind,
    pub display: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_lowercase() {
        let yaml = serde_yaml_ng::to_string(&ResourceKind::IpSet).unwrap();
        assert_eq!(yaml.trim(), "ipset");

        let parsed: ResourceKind = serde_yaml_ng::from_str("list").unwrap();
        assert_eq!(parsed, ResourceKind::List);
    }
}
