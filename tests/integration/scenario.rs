//! The two-variant walkthrough: shared, variant-only and novel content.

use crate::integration::test_utils::{checkout_values, config, items, set, two_variant_repository};
use std::collections::BTreeSet;
use strata::{Repository, RevisionRef};

#[test]
fn test_two_commits_produce_three_associations() {
    let repo = two_variant_repository();
    assert_eq!(repo.associations().len(), 3);
    assert_eq!(repo.commits().len(), 2);
    assert_eq!(repo.commits()[0].message.as_deref(), Some("first"));
}

#[test]
fn test_checkout_reproduces_committed_variants() {
    let repo = two_variant_repository();
    assert_eq!(checkout_values(&repo, "A, B"), set(&["dir", "x", "y"]));
    assert_eq!(checkout_values(&repo, "A, -B"), set(&["dir", "x", "z"]));
}

#[test]
fn test_shared_content_holds_for_feature_alone() {
    let repo = two_variant_repository();
    let shared = repo
        .associations()
        .values()
        .find(|a| checkout_like(a) == set(&["dir", "x"]))
        .expect("an association owns the shared content");
    assert!(shared.condition.holds(&config("A")));
    assert!(shared.condition.holds(&config("A, B")));
    assert!(!shared.condition.holds(&config("B")));
}

fn checkout_like(association: &strata::association::Association) -> BTreeSet<String> {
    let mut owned = BTreeSet::new();
    association.tree.visit(|_, node| {
        if node.unique {
            if let strata::artifact::ArtifactData::Generic { value, .. } = &node.artifact.data {
                owned.insert(value.clone());
            }
        }
    });
    owned
}

#[test]
fn test_associations_partition_content() {
    let repo = two_variant_repository();
    let mut seen = BTreeSet::new();
    for association in repo.associations().values() {
        for key in association.tree.unique_keys() {
            assert!(seen.insert(key), "artifact owned twice");
        }
    }
    assert_eq!(seen.len(), repo.artifact_count());
    // dir, x, y, z
    assert_eq!(seen.len(), 4);
}

#[test]
fn test_commit_creates_features_and_revisions() {
    let mut repo = Repository::new(2);
    repo.extract(&config("A"), items(&["x"]), None).unwrap();
    repo.extract(&config("A.2, B"), items(&["x", "w"]), None).unwrap();

    let a = repo.feature("A").unwrap();
    assert!(a.has_revision("1"));
    assert!(a.has_revision("2"));
    assert!(repo.feature("B").unwrap().has_revision("1"));

    // the second revision of A is a different module than the first
    assert_eq!(checkout_values(&repo, "A.2, B"), set(&["dir", "x", "w"]));
    assert_eq!(checkout_values(&repo, "A"), set(&["dir", "x"]));
    let commit = &repo.commits()[1];
    assert!(commit
        .configuration
        .selects(&RevisionRef::new("A", "2")));
}

#[test]
fn test_recommitting_a_variant_changes_nothing_structurally() {
    let mut repo = two_variant_repository();
    let before = repo.associations().len();
    repo.extract(&config("A, B"), items(&["x", "y"]), None).unwrap();
    assert_eq!(repo.associations().len(), before);
    assert_eq!(checkout_values(&repo, "A, B"), set(&["dir", "x", "y"]));
}
