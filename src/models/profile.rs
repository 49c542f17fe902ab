use indexmap::IndexMap;

/// Sentinel profile name marking a rule as inert.
///
/// A rule whose profile is `disabled` contributes no segment to the
/// compiled command; the rule stays in the table so the user can re-enable
/// it without losing the resource pairing.
pub const DISABLED_PROFILE: &str = "disabled";

/// A named argument template for the wrapped winws executable.
///
/// Templates contain the placeholder tokens `{LISTS_DIR}`, `{BIN_DIR}` and
/// `{GAME_FILTER}`, and may contain the `--new` segment separator when a
/// single strategy spans several winws filter segments. Placeholder
/// substitution is the compiler's job, not the store's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub args_template: String,
}

/// Immutable lookup table of profiles, loaded once at startup.
///
/// Insertion order is preserved so the UI lists profiles in the order the
/// config file declares them.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: IndexMap<String, Profile>,
}

impl ProfileStore {
    /// Build a store from `(name, args_template)` pairs.
    pub fn from_templates(templates: &IndexMap<String, String>) -> Self {
        let profiles = templates
            .iter()
            .map(|(name, template)| {
                (
                    name.clone(),
                    Profile {
                        name: name.clone(),
                        args_template: template.clone(),
                    },
                )
            })
            .collect();

        Self { profiles }
    }

    /// Look up a profile by name.
    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Profile names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
