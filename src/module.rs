//! Modules: minimal positive/negative feature combinations.
//!
//! A [`Module`] names features that must be present (`pos`, never empty) and
//! features that must be absent (`neg`). A [`ModuleRevision`] refines the
//! positive part to concrete feature revisions. Absence is revision
//! independent, so `neg` stays feature level in both.
//!
//! `order = |pos| + |neg| - 1`. The repository never materializes modules
//! above its configured `max_order`.

use crate::error::ApiError;
use crate::feature::Configuration;
use crate::types::{FeatureId, RevisionRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Module {
    pos: BTreeSet<FeatureId>,
    neg: BTreeSet<FeatureId>,
}

impl Module {
    pub fn new(pos: BTreeSet<FeatureId>, neg: BTreeSet<FeatureId>) -> Result<Self, ApiError> {
        if pos.is_empty() {
            return Err(ApiError::InvariantViolation(
                "module without positive features".to_string(),
            ));
        }
        if let Some(f) = pos.intersection(&neg).next() {
            return Err(ApiError::InvariantViolation(format!(
                "feature {} is both required and excluded",
                f
            )));
        }
        Ok(Self { pos, neg })
    }

    pub fn pos(&self) -> &BTreeSet<FeatureId> {
        &self.pos
    }

    pub fn neg(&self) -> &BTreeSet<FeatureId> {
        &self.neg
    }

    pub fn order(&self) -> usize {
        (self.pos.len() + self.neg.len()).saturating_sub(1)
    }

    pub fn holds(&self, configuration: &Configuration) -> bool {
        self.pos.iter().all(|f| configuration.selects_feature(f))
            && !self.neg.iter().any(|f| configuration.selects_feature(f))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .pos
            .iter()
            .cloned()
            .chain(self.neg.iter().map(|n| format!("!{}", n)))
            .collect();
        write!(f, "d{}({})", self.order(), parts.join(" & "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleRevision {
    pos: BTreeSet<RevisionRef>,
    neg: BTreeSet<FeatureId>,
}

impl ModuleRevision {
    /// The seed of the powerset expansion. Never stored.
    fn empty() -> Self {
        Self {
            pos: BTreeSet::new(),
            neg: BTreeSet::new(),
        }
    }

    pub fn new(
        pos: impl IntoIterator<Item = RevisionRef>,
        neg: impl IntoIterator<Item = FeatureId>,
    ) -> Result<Self, ApiError> {
        let revision = Self {
            pos: pos.into_iter().collect(),
            neg: neg.into_iter().collect(),
        };
        revision.module()?;
        Ok(revision)
    }

    pub fn pos(&self) -> &BTreeSet<RevisionRef> {
        &self.pos
    }

    pub fn neg(&self) -> &BTreeSet<FeatureId> {
        &self.neg
    }

    /// Number of literals; `order + 1` for stored module revisions.
    pub fn size(&self) -> usize {
        self.pos.len() + self.neg.len()
    }

    pub fn order(&self) -> usize {
        self.size().saturating_sub(1)
    }

    /// Projects to the feature-level module.
    pub fn module(&self) -> Result<Module, ApiError> {
        Module::new(
            self.pos.iter().map(|r| r.feature.clone()).collect(),
            self.neg.clone(),
        )
    }

    pub fn holds(&self, configuration: &Configuration) -> bool {
        self.pos.iter().all(|r| configuration.selects(r))
            && !self.neg.iter().any(|f| configuration.selects_feature(f))
    }

    /// Whether any literal mentions the feature.
    pub fn mentions(&self, feature: &str) -> bool {
        self.neg.contains(feature) || self.pos.iter().any(|r| r.feature == feature)
    }

    pub fn with_positive(&self, revision: RevisionRef) -> Self {
        let mut derived = self.clone();
        derived.pos.insert(revision);
        derived
    }

    pub fn with_negative(&self, feature: FeatureId) -> Self {
        let mut derived = self.clone();
        derived.neg.insert(feature);
        derived
    }

    /// Drops negated features for which `keep` returns false.
    pub(crate) fn without_negatives(&self, keep: impl Fn(&FeatureId) -> bool) -> Self {
        Self {
            pos: self.pos.clone(),
            neg: self.neg.iter().filter(|f| keep(f)).cloned().collect(),
        }
    }
}

impl fmt::Display for ModuleRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .pos
            .iter()
            .map(|r| r.to_string())
            .chain(self.neg.iter().map(|n| format!("!{}", n)))
            .collect();
        write!(f, "d{}({})", self.order(), parts.join(" & "))
    }
}

/// Observation statistics for one module and its revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub count: u64,
    pub revisions: BTreeMap<ModuleRevision, u64>,
}

/// Repository module table.
pub type ModuleTable = BTreeMap<Module, ModuleEntry>;

/// Records observations of the given module revisions, creating entries lazily.
pub fn record_observations<'a>(
    table: &mut ModuleTable,
    observed: impl IntoIterator<Item = &'a ModuleRevision>,
) -> Result<(), ApiError> {
    for revision in observed {
        let entry = table.entry(revision.module()?).or_default();
        entry.count += 1;
        *entry.revisions.entry(revision.clone()).or_insert(0) += 1;
    }
    Ok(())
}

/// Computes the module revisions induced by a configuration.
///
/// The positive powerset of the selected revisions is built first (seed
/// excluded), then every repository feature not selected positively is added
/// negatively to each module still below `max_order`.
pub fn compute_module_revisions<'a>(
    configuration: &Configuration,
    features: impl IntoIterator<Item = &'a FeatureId>,
    max_order: usize,
) -> BTreeSet<ModuleRevision> {
    let mut modules = vec![ModuleRevision::empty()];

    for revision in configuration.positive() {
        let derived: Vec<ModuleRevision> = modules
            .iter()
            .filter(|m| m.size() <= max_order)
            .map(|m| m.with_positive(revision.clone()))
            .collect();
        modules.extend(derived);
    }
    modules.retain(|m| !m.pos.is_empty());

    for feature in features {
        if configuration.selects_feature(feature) {
            continue;
        }
        let derived: Vec<ModuleRevision> = modules
            .iter()
            .filter(|m| m.size() <= max_order)
            .map(|m| m.with_negative(feature.clone()))
            .collect();
        modules.extend(derived);
    }

    modules.into_iter().collect()
}

/// Feature-level modules induced by a configuration.
pub fn compute_modules<'a>(
    configuration: &Configuration,
    features: impl IntoIterator<Item = &'a FeatureId>,
    max_order: usize,
) -> Result<BTreeSet<Module>, ApiError> {
    compute_module_revisions(configuration, features, max_order)
        .iter()
        .map(ModuleRevision::module)
        .collect()
}

/// Extends every module revision below `max_order` with a newly introduced
/// feature negated.
///
/// Returns `(base, extended)` pairs so conditions can be widened accordingly.
/// A clone that already exists in the table is an invariant violation.
pub fn retrofit_feature(
    table: &mut ModuleTable,
    feature: &FeatureId,
    max_order: usize,
) -> Result<Vec<(ModuleRevision, ModuleRevision)>, ApiError> {
    let mut pairs = Vec::new();
    let mut additions: Vec<(Module, ModuleEntry)> = Vec::new();

    for (module, entry) in table.iter() {
        if module.order() >= max_order || module.pos.contains(feature) || module.neg.contains(feature) {
            continue;
        }
        let mut neg = module.neg.clone();
        neg.insert(feature.clone());
        let extended = Module::new(module.pos.clone(), neg)?;
        if table.contains_key(&extended) {
            return Err(ApiError::InvariantViolation(format!(
                "module {} already exists while adding feature {}",
                extended, feature
            )));
        }

        let mut extended_entry = ModuleEntry {
            count: entry.count,
            revisions: BTreeMap::new(),
        };
        for (revision, count) in &entry.revisions {
            let extended_revision = revision.with_negative(feature.clone());
            extended_entry
                .revisions
                .insert(extended_revision.clone(), *count);
            pairs.push((revision.clone(), extended_revision));
        }
        additions.push((extended, extended_entry));
    }

    table.extend(additions);
    Ok(pairs)
}
