//! Copy, subset, merge, split and consolidation through the public API.

use crate::integration::test_utils::{
    checkout_values, config, items, referencing_repository, set, two_variant_repository,
};
use std::collections::BTreeSet;
use strata::{ApiError, Repository, RevisionRef};

#[test]
fn test_copy_is_independent() {
    let repo = two_variant_repository();
    let mut copy = repo.copy().unwrap();
    assert_eq!(copy, repo);
    assert_eq!(copy.digest().unwrap(), repo.digest().unwrap());

    copy.extract(&config("C"), items(&["c"]), None).unwrap();
    assert_ne!(copy.digest().unwrap(), repo.digest().unwrap());
    assert!(repo.feature("C").is_none());
}

#[test]
fn test_subset_removes_revision_and_its_content() {
    let repo = two_variant_repository();
    let deselected: BTreeSet<RevisionRef> = [RevisionRef::new("B", "1")].into_iter().collect();
    let subset = repo.subset(&deselected, 2).unwrap();

    assert!(subset.feature("B").is_none());
    assert!(subset.feature("A").is_some());
    for association in subset.associations().values() {
        assert!(!association.condition.modules().any(|m| m.mentions("B")));
    }
    // y needed B; z only needed B to be absent
    assert_eq!(checkout_values(&subset, "A"), set(&["dir", "x", "z"]));
    // the source is untouched
    assert_eq!(repo.associations().len(), 3);
}

#[test]
fn test_subset_drops_commits_of_removed_revisions() {
    let repo = two_variant_repository();
    let deselected: BTreeSet<RevisionRef> = [RevisionRef::new("B", "1")].into_iter().collect();
    let subset = repo.subset(&deselected, 1).unwrap();
    assert_eq!(subset.max_order(), 1);
    assert_eq!(subset.commits().len(), 1);
    assert_eq!(subset.commits()[0].message.as_deref(), Some("second"));
}

#[test]
fn test_merge_retrofits_features_from_both_sides() {
    let mut ours = Repository::new(2);
    ours.extract(&config("A"), items(&["x"]), None).unwrap();
    let mut theirs = Repository::new(2);
    theirs.extract(&config("B"), items(&["x", "w"]), None).unwrap();

    ours.merge(theirs).unwrap();

    assert!(ours.feature("A").is_some());
    assert!(ours.feature("B").is_some());
    assert_eq!(ours.commits().len(), 2);
    assert_eq!(checkout_values(&ours, "A"), set(&["dir", "x"]));
    assert_eq!(checkout_values(&ours, "B"), set(&["dir", "x", "w"]));

    let mut seen = BTreeSet::new();
    for association in ours.associations().values() {
        for key in association.tree.unique_keys() {
            assert!(seen.insert(key));
        }
    }
}

#[test]
fn test_merge_rejects_higher_order_source() {
    let mut ours = Repository::new(1);
    let theirs = Repository::new(2);
    let err = ours.merge(theirs).unwrap_err();
    assert!(matches!(err, ApiError::UnsupportedOperation(_)));
}

#[test]
fn test_split_then_consolidate_restores_association_count() {
    let mut repo = Repository::new(2);
    repo.extract(&config("A"), items(&["x", "y"]), None).unwrap();
    let id = *repo.associations().keys().next().unwrap();
    repo.association_mut(id).unwrap().tree.children[0].children[1]
        .artifact
        .marked = true;

    let created = repo.split().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(repo.associations().len(), 2);

    assert_eq!(repo.consolidate_associations().unwrap(), 1);
    assert_eq!(repo.associations().len(), 1);
    assert_eq!(checkout_values(&repo, "A"), set(&["dir", "x", "y"]));
}

#[test]
fn test_consolidate_keeps_distinct_conditions() {
    let mut repo = two_variant_repository();
    assert_eq!(repo.consolidate_associations().unwrap(), 0);
    assert_eq!(repo.associations().len(), 3);
}

#[test]
fn test_subset_keeps_negative_evidence_of_untouched_variants() {
    let mut repo = Repository::new(2);
    repo.extract(&config("B"), items(&[]), None).unwrap();
    repo.extract(&config("A, B"), items(&["u"]), None).unwrap();
    repo.extract(&config("B, C"), items(&["u"]), None).unwrap();
    assert_eq!(checkout_values(&repo, "B"), set(&["dir"]));

    let deselected: BTreeSet<RevisionRef> = [RevisionRef::new("C", "1")].into_iter().collect();
    let subset = repo.subset(&deselected, 2).unwrap();
    assert!(subset.feature("C").is_none());
    assert_eq!(checkout_values(&subset, "B"), set(&["dir"]));
    assert_eq!(checkout_values(&subset, "A, B"), set(&["dir", "u"]));
}

#[test]
fn test_subset_rejects_dangling_references() {
    let repo = referencing_repository();
    let deselected: BTreeSet<RevisionRef> = [RevisionRef::new("B", "1")].into_iter().collect();
    let err = repo.subset(&deselected, 2).unwrap_err();
    assert!(matches!(err, ApiError::UnresolvedDependencies(_)));

    // dropping the referencing side is fine
    let deselected: BTreeSet<RevisionRef> = [RevisionRef::new("A", "1")].into_iter().collect();
    let subset = repo.subset(&deselected, 2).unwrap();
    assert_eq!(checkout_values(&subset, "B"), set(&["dir", "def"]));
}
