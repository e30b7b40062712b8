//! Presence conditions attached to associations.
//!
//! A condition is four sets of module revisions gathered from observations:
//!
//! - `min`: modules present in every configuration the content was seen in (all must hold)
//! - `max`: modules present in at least one of them (one must hold)
//! - `not`: modules of configurations the content was absent from, minus `max` when recorded (none may hold)
//! - `all`: `max ∪ not`
//!
//! Equality of all four sets is the consolidation key.

use crate::error::ApiError;
use crate::feature::Configuration;
use crate::module::{Module, ModuleRevision};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PresenceCondition {
    min: BTreeSet<ModuleRevision>,
    max: BTreeSet<ModuleRevision>,
    not: BTreeSet<ModuleRevision>,
    all: BTreeSet<ModuleRevision>,
}

/// Outcome of rewriting one module revision during a subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRewrite {
    Keep(ModuleRevision),
    /// The module no longer exists; it constrains nothing.
    Drop,
    /// The module can no longer hold.
    False,
}

impl PresenceCondition {
    /// Condition of content observed once under the given modules.
    pub fn from_observation(observed: &BTreeSet<ModuleRevision>) -> Self {
        Self {
            min: observed.clone(),
            max: observed.clone(),
            not: BTreeSet::new(),
            all: observed.clone(),
        }
    }

    pub fn min_set(&self) -> &BTreeSet<ModuleRevision> {
        &self.min
    }

    pub fn max_set(&self) -> &BTreeSet<ModuleRevision> {
        &self.max
    }

    pub fn not_set(&self) -> &BTreeSet<ModuleRevision> {
        &self.not
    }

    pub fn all_set(&self) -> &BTreeSet<ModuleRevision> {
        &self.all
    }

    /// A condition with no positive evidence never holds.
    pub fn is_empty(&self) -> bool {
        self.max.is_empty()
    }

    pub fn holds(&self, configuration: &Configuration) -> bool {
        !self.max.is_empty()
            && self.min.iter().all(|m| m.holds(configuration))
            && self.max.iter().any(|m| m.holds(configuration))
            && !self.not.iter().any(|m| m.holds(configuration))
    }

    /// Condition of content shared by two associations.
    pub fn union(&self, other: &PresenceCondition) -> Self {
        let min = self.min.intersection(&other.min).cloned().collect();
        let max: BTreeSet<ModuleRevision> = self.max.union(&other.max).cloned().collect();
        let not = self
            .not
            .union(&other.not)
            .filter(|m| !max.contains(*m))
            .cloned()
            .collect();
        let mut condition = Self {
            min,
            max,
            not,
            all: BTreeSet::new(),
        };
        condition.refresh_all();
        condition
    }

    /// Records a configuration in which the content was absent.
    pub fn add_absence(&mut self, observed: &BTreeSet<ModuleRevision>) {
        for module in observed {
            if !self.max.contains(module) {
                self.not.insert(module.clone());
            }
        }
        self.refresh_all();
    }

    /// Widens every set containing a base module with its retrofitted extension.
    pub fn update_with_new_modules(&mut self, pairs: &[(ModuleRevision, ModuleRevision)]) {
        for (base, extended) in pairs {
            if self.min.contains(base) {
                self.min.insert(extended.clone());
            }
            if self.max.contains(base) {
                self.max.insert(extended.clone());
            }
            if self.not.contains(base) {
                self.not.insert(extended.clone());
            }
        }
        self.refresh_all();
    }

    /// Rewrites every module revision.
    ///
    /// A false module in `min` makes the whole condition unsatisfiable; false
    /// modules in `max` and `not` are dropped. Dropped modules vanish from
    /// every set. A rewritten `not` module may coincide with a `max` module;
    /// it is kept, the negative evidence still excludes its configurations.
    pub fn rewrite(&self, rewrite: impl Fn(&ModuleRevision) -> ModuleRewrite) -> Self {
        let mut min = BTreeSet::new();
        for module in &self.min {
            match rewrite(module) {
                ModuleRewrite::Keep(m) => {
                    min.insert(m);
                }
                ModuleRewrite::Drop => {}
                ModuleRewrite::False => return Self::default(),
            }
        }
        let keep = |set: &BTreeSet<ModuleRevision>| -> BTreeSet<ModuleRevision> {
            set.iter()
                .filter_map(|m| match rewrite(m) {
                    ModuleRewrite::Keep(m) => Some(m),
                    ModuleRewrite::Drop | ModuleRewrite::False => None,
                })
                .collect()
        };
        let max = keep(&self.max);
        if max.is_empty() {
            return Self::default();
        }
        let not = keep(&self.not);
        let mut condition = Self {
            min,
            max,
            not,
            all: BTreeSet::new(),
        };
        condition.refresh_all();
        condition
    }

    /// Feature-level projection of `min`.
    pub fn min_modules(&self) -> Result<BTreeSet<Module>, ApiError> {
        self.min.iter().map(ModuleRevision::module).collect()
    }

    /// Every module revision mentioned by the condition (`min` is a subset of `max`).
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRevision> {
        self.all.iter()
    }

    fn refresh_all(&mut self) {
        self.all = self.max.union(&self.not).cloned().collect();
    }

    /// Compact rendering: the lowest order `min` modules, then negations.
    pub fn simplified(&self) -> String {
        if self.is_empty() {
            return "false".to_string();
        }
        let lowest = self.min.iter().map(|m| m.order()).min();
        let mut parts: Vec<String> = match lowest {
            Some(order) => self
                .min
                .iter()
                .filter(|m| m.order() == order)
                .map(|m| m.to_string())
                .collect(),
            None => vec![format!(
                "({})",
                self.max
                    .iter()
                    .map(|m| m.to_string())
                    .collect::<Vec<_>>()
                    .join(" | ")
            )],
        };
        let lowest_not = self.not.iter().map(|m| m.order()).min();
        if let Some(order) = lowest_not {
            parts.extend(
                self.not
                    .iter()
                    .filter(|m| m.order() == order)
                    .map(|m| format!("!{}", m)),
            );
        }
        parts.join(" & ")
    }
}

impl fmt::Display for PresenceCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |set: &BTreeSet<ModuleRevision>| {
            set.iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "min[{}] max[{}] not[{}]",
            render(&self.min),
            render(&self.max),
            render(&self.not)
        )
    }
}
