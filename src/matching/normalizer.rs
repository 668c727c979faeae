//! Channel name normalization
//!
//! Upstream feeds spell the same channel in many ways (`CCTV-1 综合`,
//! `cctv1`, `CCTV1 HD`). The normalizer reduces a name to a canonical key in
//! three steps:
//!
//! 1. fold the name (uppercase, keep only alphanumerics, `_` and `+`) and look
//!    it up in the alias table
//! 2. run the ordered family patterns against the folded name and take the
//!    first capture group, mapping it through the alias table again
//! 3. fall back to the folded name itself
//!
//! Canonical alias names map to themselves and every key produced is stable
//! under a second normalization.

use regex::Regex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, warn};

use crate::config::NamingConfig;
use crate::errors::{AppError, AppResult};
use crate::models::AliasGroup;

/// Precomputed matching data for one channel name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelProbe {
    /// Normalized key
    pub key: String,
    /// Folded raw name
    pub folded: String,
    /// Folded name plus every folded member of its alias group
    pub forms: Vec<String>,
}

/// Name normalizer built once per run from the naming configuration and the
/// alias table
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    /// Folded alias form -> index into `canonicals`
    alias_keys: HashMap<String, usize>,
    canonicals: Vec<String>,
    alias_forms: Vec<Vec<String>>,
    families: Vec<Regex>,
    fuzzy_matching: bool,
}

impl NameNormalizer {
    /// Compile the family patterns and the alias table
    ///
    /// Canonical names are claimed first. A variant listed in several groups
    /// belongs to the group with the highest priority; ties go to the group
    /// declared first.
    pub fn new(naming: &NamingConfig, aliases: &[AliasGroup]) -> AppResult<Self> {
        let mut families = Vec::with_capacity(naming.families.len());
        for pattern in &naming.families {
            let regex = Regex::new(pattern).map_err(|e| {
                AppError::configuration(format!("invalid family pattern '{pattern}': {e}"))
            })?;
            families.push(regex);
        }

        let mut alias_keys: HashMap<String, usize> = HashMap::new();
        let mut canonicals: Vec<String> = Vec::new();
        let mut alias_forms: Vec<Vec<String>> = Vec::new();
        let mut owners: Vec<Option<usize>> = Vec::with_capacity(aliases.len());

        for group in aliases {
            let key = Self::fold(&group.canonical);
            if key.is_empty() {
                warn!(
                    "Alias group '{}' has no usable characters, ignoring",
                    group.canonical
                );
                owners.push(None);
                continue;
            }

            let owner = match alias_keys.entry(key.clone()) {
                Entry::Occupied(existing) => {
                    debug!(
                        "Alias group '{}' folds onto '{}', merging",
                        group.canonical,
                        canonicals[*existing.get()]
                    );
                    *existing.get()
                }
                Entry::Vacant(slot) => {
                    canonicals.push(group.canonical.trim().to_string());
                    alias_forms.push(vec![key]);
                    *slot.insert(canonicals.len() - 1)
                }
            };
            owners.push(Some(owner));
        }

        // Stable sort keeps declaration order among equal priorities
        let mut by_priority: Vec<usize> = (0..aliases.len()).collect();
        by_priority.sort_by_key(|&idx| Reverse(aliases[idx].priority));

        for idx in by_priority {
            let Some(owner) = owners[idx] else {
                continue;
            };
            for variant in &aliases[idx].variants {
                let key = Self::fold(variant);
                if key.is_empty() {
                    continue;
                }
                if !alias_forms[owner].contains(&key) {
                    alias_forms[owner].push(key.clone());
                }
                match alias_keys.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(owner);
                    }
                    Entry::Occupied(existing) if *existing.get() != owner => {
                        debug!(
                            "Alias '{}' of '{}' already belongs to '{}'",
                            variant,
                            canonicals[owner],
                            canonicals[*existing.get()]
                        );
                    }
                    Entry::Occupied(_) => {}
                }
            }
        }

        debug!(
            "Normalizer ready: {} alias groups, {} alias keys, {} family patterns",
            canonicals.len(),
            alias_keys.len(),
            families.len()
        );

        Ok(Self {
            alias_keys,
            canonicals,
            alias_forms,
            families,
            fuzzy_matching: true,
        })
    }

    /// Enable or disable substring matching between alias forms
    pub fn with_fuzzy_matching(mut self, enabled: bool) -> Self {
        self.fuzzy_matching = enabled;
        self
    }

    /// Uppercase and drop everything except alphanumerics, `_` and `+`
    pub fn fold(name: &str) -> String {
        name.chars()
            .flat_map(char::to_uppercase)
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '+')
            .collect()
    }

    /// Canonical key of a channel name
    pub fn normalize(&self, name: &str) -> String {
        self.normalize_folded(&Self::fold(name))
    }

    fn normalize_folded(&self, folded: &str) -> String {
        if folded.is_empty() {
            return String::new();
        }
        if let Some(canonical) = self.canonical_for(folded) {
            return canonical.to_string();
        }

        for family in &self.families {
            let captured = family
                .captures(folded)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                .map(|m| m.as_str())
                .filter(|key| !key.is_empty());

            if let Some(key) = captured {
                return match self.canonical_for(key) {
                    Some(canonical) => canonical.to_string(),
                    None => key.to_string(),
                };
            }
        }

        folded.to_string()
    }

    fn canonical_for(&self, folded: &str) -> Option<&str> {
        self.alias_keys
            .get(folded)
            .map(|&idx| self.canonicals[idx].as_str())
    }

    /// Precompute the key and alias forms of a name
    pub fn probe(&self, name: &str) -> ChannelProbe {
        let folded = Self::fold(name);
        let key = self.normalize_folded(&folded);

        let mut forms = Vec::new();
        if !folded.is_empty() {
            forms.push(folded.clone());
        }
        if let Some(&idx) = self.alias_keys.get(&Self::fold(&key)) {
            for form in &self.alias_forms[idx] {
                if !forms.contains(form) {
                    forms.push(form.clone());
                }
            }
        }

        ChannelProbe { key, folded, forms }
    }

    /// Whether two probes refer to the same channel
    pub fn probes_match(&self, a: &ChannelProbe, b: &ChannelProbe) -> bool {
        if a.key == b.key {
            return true;
        }
        self.fuzzy_matching
            && (a.forms.iter().any(|form| b.folded.contains(form.as_str()))
                || b.forms.iter().any(|form| a.folded.contains(form.as_str())))
    }

    /// Whether two names refer to the same channel
    pub fn is_channel_match(&self, a: &str, b: &str) -> bool {
        self.probes_match(&self.probe(a), &self.probe(b))
    }
}
