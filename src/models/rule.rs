use crate::models::profile::DISABLED_PROFILE;
use crate::models::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One (resource, profile) pairing, compiled into one segment of the final
/// winws command.
///
/// `resource` is a filename under the lists directory; `None` means the
/// rule is profile-only (IP-range/port-only strategies need no list).
/// `profile` may be the [`DISABLED_PROFILE`] sentinel, which keeps the rule
/// in the table but out of the compiled command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "List", default)]
    pub resource: Option<String>,

    #[serde(rename = "Type", default)]
    pub resource_kind: Option<ResourceKind>,

    #[serde(rename = "Profile")]
    pub profile: String,
}

impl Rule {
    pub fn new(
        resource: Option<String>,
        resource_kind: Option<ResourceKind>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            resource_kind,
            profile: profile.into(),
        }
    }

    /// Whether this rule participates in compilation.
    pub fn is_enabled(&self) -> bool {
        self.profile != DISABLED_PROFILE
    }
}

/// A field-level edit applied to a rule in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleChange {
    Resource(Option<String>),
    ResourceKind(Option<ResourceKind>),
    Profile(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RuleTableError {
    #[error("Rule index {0} out of bounds")]
    IndexOutOfBounds(usize),
}

/// Ordered, editable collection of rules.
///
/// Rule order determines segment order in the compiled command. Indices are
/// stable within a session: removing index i deletes exactly that rule and
/// shifts every following rule down by one. Persistence is delegated to the
/// settings layer, which serializes the rule list verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn remove_rule(&mut self, index: usize) -> Result<Rule, RuleTableError> {
        if index >= self.rules.len() {
            return Err(RuleTableError::IndexOutOfBounds(index));
        }
        Ok(self.rules.remove(index))
    }

    pub fn update_rule(&mut self, index: usize, change: RuleChange) -> Result<(), RuleTableError> {
        let rule = self
            .rules
            .get_mut(index)
            .ok_or(RuleTableError::IndexOutOfBounds(index))?;

        match change {
            RuleChange::Resource(resource) => rule.resource = resource,
            RuleChange::ResourceKind(kind) => rule.resource_kind = kind,
            RuleChange::Profile(profile) => rule.profile = profile,
        }

        Ok(())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules that would contribute a segment.
    pub fn enabled_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_enabled()).count()
    }
}
