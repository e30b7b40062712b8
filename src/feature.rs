//! Features, feature revisions and configurations.
//!
//! A [`Configuration`] is the caller's selection of signed feature revisions
//! describing one product variant. Its textual form is a comma separated list
//! of `[+|-]feature[.revision]` entries, e.g. `"A.1, -B, C.2"`. An entry without
//! a revision selects [`DEFAULT_REVISION`].

use crate::error::ApiError;
use crate::types::{FeatureId, RevisionId, RevisionRef, DEFAULT_REVISION};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// One version of a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRevision {
    pub id: RevisionId,
    pub description: String,
}

/// A named variation point owning its revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    id: FeatureId,
    pub name: String,
    pub description: String,
    revisions: Vec<FeatureRevision>,
}

impl Feature {
    pub fn new(id: impl Into<FeatureId>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            revisions: Vec::new(),
        }
    }

    pub fn id(&self) -> &FeatureId {
        &self.id
    }

    pub fn revisions(&self) -> &[FeatureRevision] {
        &self.revisions
    }

    pub fn revision(&self, id: &str) -> Option<&FeatureRevision> {
        self.revisions.iter().find(|r| r.id == id)
    }

    pub fn has_revision(&self, id: &str) -> bool {
        self.revision(id).is_some()
    }

    /// Most recently added revision.
    pub fn latest_revision(&self) -> Option<&FeatureRevision> {
        self.revisions.last()
    }

    /// Adds a revision; returns `false` when it already existed.
    pub fn add_revision(&mut self, id: impl Into<RevisionId>) -> bool {
        let id = id.into();
        if self.has_revision(&id) {
            return false;
        }
        self.revisions.push(FeatureRevision {
            id,
            description: String::new(),
        });
        true
    }

    /// Drops the given revisions, keeping the order of the rest.
    pub fn retain_revisions(&mut self, keep: impl Fn(&RevisionRef) -> bool) {
        let feature = self.id.clone();
        self.revisions
            .retain(|r| keep(&RevisionRef::new(feature.clone(), r.id.clone())));
    }

    pub fn revision_refs(&self) -> impl Iterator<Item = RevisionRef> + '_ {
        self.revisions
            .iter()
            .map(move |r| RevisionRef::new(self.id.clone(), r.id.clone()))
    }
}

/// A signed selection of one feature revision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureInstance {
    pub revision: RevisionRef,
    pub positive: bool,
}

impl FeatureInstance {
    pub fn positive(revision: RevisionRef) -> Self {
        Self {
            revision,
            positive: true,
        }
    }

    pub fn negative(revision: RevisionRef) -> Self {
        Self {
            revision,
            positive: false,
        }
    }
}

impl fmt::Display for FeatureInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.positive {
            write!(f, "{}", self.revision)
        } else {
            write!(f, "-{}", self.revision)
        }
    }
}

impl FromStr for FeatureInstance {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (positive, body) = match s.chars().next() {
            Some('-') => (false, &s[1..]),
            Some('+') => (true, &s[1..]),
            _ => (true, s),
        };
        let body = body.trim();
        let (feature, revision) = match body.rsplit_once('.') {
            Some((feature, revision)) => (feature, revision),
            None => (body, DEFAULT_REVISION),
        };
        if feature.is_empty() || feature.chars().any(char::is_whitespace) {
            return Err(ApiError::InvalidConfiguration(format!(
                "Invalid feature name in '{}'",
                s
            )));
        }
        if revision.is_empty() {
            return Err(ApiError::InvalidConfiguration(format!(
                "Empty revision in '{}'",
                s
            )));
        }
        Ok(Self {
            revision: RevisionRef::new(feature, revision),
            positive,
        })
    }
}

/// An ordered, validated selection of feature instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    instances: Vec<FeatureInstance>,
}

impl Configuration {
    /// Builds a configuration, rejecting contradictory selections.
    ///
    /// Repeated identical instances are collapsed. A feature may be selected
    /// positively in at most one revision.
    pub fn new(instances: impl IntoIterator<Item = FeatureInstance>) -> Result<Self, ApiError> {
        let mut seen: BTreeSet<FeatureInstance> = BTreeSet::new();
        let mut positive_by_feature: BTreeMap<FeatureId, RevisionId> = BTreeMap::new();
        let mut ordered = Vec::new();

        for instance in instances {
            if seen.contains(&instance) {
                continue;
            }
            let opposite = FeatureInstance {
                revision: instance.revision.clone(),
                positive: !instance.positive,
            };
            if seen.contains(&opposite) {
                return Err(ApiError::InvalidConfiguration(format!(
                    "{} is selected both positively and negatively",
                    instance.revision
                )));
            }
            if instance.positive {
                if let Some(other) = positive_by_feature.insert(
                    instance.revision.feature.clone(),
                    instance.revision.revision.clone(),
                ) {
                    return Err(ApiError::InvalidConfiguration(format!(
                        "Feature {} is selected in revisions {} and {}",
                        instance.revision.feature, other, instance.revision.revision
                    )));
                }
            }
            seen.insert(instance.clone());
            ordered.push(instance);
        }

        Ok(Self { instances: ordered })
    }

    pub fn parse(s: &str) -> Result<Self, ApiError> {
        s.parse()
    }

    pub fn instances(&self) -> &[FeatureInstance] {
        &self.instances
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Positively selected revisions in selection order.
    pub fn positive(&self) -> impl Iterator<Item = &RevisionRef> {
        self.instances
            .iter()
            .filter(|i| i.positive)
            .map(|i| &i.revision)
    }

    pub fn has_positive(&self) -> bool {
        self.positive().next().is_some()
    }

    /// Whether the exact revision is positively selected.
    pub fn selects(&self, revision: &RevisionRef) -> bool {
        self.positive().any(|r| r == revision)
    }

    /// Whether any revision of the feature is positively selected.
    pub fn selects_feature(&self, feature: &str) -> bool {
        self.positive().any(|r| r.feature == feature)
    }

    /// Every revision mentioned, regardless of sign.
    pub fn revisions(&self) -> impl Iterator<Item = &RevisionRef> {
        self.instances.iter().map(|i| &i.revision)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.instances.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl FromStr for Configuration {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let instances = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(FeatureInstance::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Configuration::new(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_configuration() {
        let config = Configuration::parse("A.1, -B, +C.2").unwrap();
        assert_eq!(config.instances().len(), 3);
        assert!(config.selects(&RevisionRef::new("A", "1")));
        assert!(!config.selects_feature("B"));
        assert!(config.selects(&RevisionRef::new("C", "2")));
        assert_eq!(config.to_string(), "A.1, -B.1, C.2");
    }

    #[test]
    fn test_default_revision() {
        let config = Configuration::parse("A").unwrap();
        assert!(config.selects(&RevisionRef::new("A", DEFAULT_REVISION)));
    }

    #[test]
    fn test_conflicting_signs_rejected() {
        let err = Configuration::parse("A.1, -A.1").unwrap_err();
        assert!(matches!(err, ApiError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_two_positive_revisions_rejected() {
        assert!(Configuration::parse("A.1, A.2").is_err());
    }

    #[test]
    fn test_duplicates_collapse() {
        let config = Configuration::parse("A.1, A.1").unwrap();
        assert_eq!(config.instances().len(), 1);
    }

    #[test]
    fn test_invalid_entries() {
        assert!(Configuration::parse("A.").is_err());
        assert!(Configuration::parse("-").is_err());
        assert!(Configuration::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_feature_revisions() {
        let mut feature = Feature::new("A");
        assert!(feature.add_revision("1"));
        assert!(!feature.add_revision("1"));
        assert!(feature.add_revision("2"));
        assert_eq!(feature.latest_revision().unwrap().id, "2");
        feature.retain_revisions(|r| r.revision != "1");
        assert_eq!(feature.revisions().len(), 1);
    }
}
