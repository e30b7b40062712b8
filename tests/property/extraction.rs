//! Property-based tests for extraction and composition over random commit histories

use proptest::prelude::*;
use proptest::sample::subsequence;
use std::collections::BTreeSet;
use strata::artifact::{Artifact, ArtifactData};
use strata::text::reader::text_file;
use strata::tree::{Node, RootNode};
use strata::{Configuration, FeatureInstance, Repository, RevisionRef};

const FEATURES: [&str; 3] = ["A", "B", "C"];
const POOL: [&str; 6] = ["p", "q", "r", "s", "t", "u"];

fn tree(values: &[&str]) -> RootNode {
    let item = |v: &str| {
        Node::new(Artifact::new(ArtifactData::Generic {
            kind: "item".to_string(),
            value: v.to_string(),
        }))
    };
    RootNode::new().with_child(item("dir").with_children(values.iter().map(|v| item(*v))))
}

/// 0 leaves a feature out, 1 selects it, 2 deselects it. At least one is selected.
fn configuration(signs: &[u8]) -> Configuration {
    let mut instances: Vec<FeatureInstance> = FEATURES
        .iter()
        .zip(signs)
        .filter_map(|(feature, sign)| match sign {
            1 => Some(FeatureInstance::positive(RevisionRef::new(*feature, "1"))),
            2 => Some(FeatureInstance::negative(RevisionRef::new(*feature, "1"))),
            _ => None,
        })
        .collect();
    if !instances.iter().any(|i| i.positive) {
        instances.retain(|i| i.revision.feature != "A");
        instances.push(FeatureInstance::positive(RevisionRef::new("A", "1")));
    }
    Configuration::new(instances).unwrap()
}

/// Every feature mentioned: bit `i` of `mask` selects `FEATURES[i]`, the rest
/// are deselected. `mask` is non-zero.
fn complete_configuration(mask: u8) -> Configuration {
    let instances = FEATURES.iter().enumerate().map(|(i, feature)| {
        let revision = RevisionRef::new(*feature, "1");
        if mask & (1 << i) != 0 {
            FeatureInstance::positive(revision)
        } else {
            FeatureInstance::negative(revision)
        }
    });
    Configuration::new(instances).unwrap()
}

fn source_file(lines: &[&str]) -> RootNode {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    let mut root = RootNode::new();
    root.children.push(text_file("main.c".to_string(), &text));
    root
}

/// Distinct variants, each committed once.
fn distinct_masks() -> impl Strategy<Value = Vec<u8>> {
    subsequence((1u8..8).collect::<Vec<_>>(), 1..=4).prop_shuffle()
}

fn commit_strategy() -> impl Strategy<Value = (Vec<u8>, Vec<&'static str>)> {
    (
        proptest::collection::vec(0u8..3, FEATURES.len()),
        subsequence(POOL.to_vec(), 0..=POOL.len()),
    )
}

fn assert_partition(repo: &Repository) {
    let mut seen = BTreeSet::new();
    for association in repo.associations().values() {
        for key in association.tree.unique_keys() {
            assert!(seen.insert(key), "artifact owned by two associations");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn associations_partition_and_cover_commits(
        commits in proptest::collection::vec(commit_strategy(), 1..5)
    ) {
        let mut repo = Repository::new(2);
        let mut committed = Vec::new();
        for (signs, values) in &commits {
            let configuration = configuration(signs);
            let variant = tree(values);
            repo.extract(&configuration, variant.clone(), None).unwrap();
            assert_partition(&repo);
            committed.push((configuration, variant));
        }

        for (configuration, variant) in &committed {
            let composed = repo.compose(configuration, true).unwrap().materialize();
            let composed_keys: BTreeSet<_> = composed.path_keys().into_iter().collect();
            for key in variant.path_keys() {
                prop_assert!(
                    composed_keys.contains(&key),
                    "{} lost content it was committed with",
                    configuration
                );
            }
        }
    }

    #[test]
    fn lazy_and_eager_composition_agree(
        commits in proptest::collection::vec(commit_strategy(), 1..4),
        query in proptest::collection::vec(0u8..3, FEATURES.len()),
    ) {
        let mut repo = Repository::new(2);
        for (signs, values) in &commits {
            repo.extract(&configuration(signs), tree(values), None).unwrap();
        }
        let query = configuration(&query);
        let lazy = repo.compose(&query, true).unwrap();
        let eager = repo.compose(&query, false).unwrap();
        prop_assert_eq!(&lazy.selected, &eager.selected);
        prop_assert!(lazy.materialize().structurally_eq(&eager.materialize()));
        prop_assert_eq!(lazy.order_warnings(), eager.order_warnings());
    }

    #[test]
    fn copies_share_the_digest(
        commits in proptest::collection::vec(commit_strategy(), 1..4)
    ) {
        let mut repo = Repository::new(2);
        for (signs, values) in &commits {
            repo.extract(&configuration(signs), tree(values), None).unwrap();
        }
        let copy = repo.copy().unwrap();
        prop_assert_eq!(copy.digest().unwrap(), repo.digest().unwrap());
    }

    #[test]
    fn distinct_variants_check_out_exactly(
        (masks, contents) in distinct_masks().prop_flat_map(|masks| {
            let n = masks.len();
            (
                Just(masks),
                proptest::collection::vec(subsequence(POOL.to_vec(), 0..=POOL.len()), n),
            )
        })
    ) {
        let mut repo = Repository::new(2);
        for (mask, values) in masks.iter().zip(&contents) {
            repo.extract(&complete_configuration(*mask), tree(values), None).unwrap();
        }
        for (mask, values) in masks.iter().zip(&contents) {
            let configuration = complete_configuration(*mask);
            let composed = repo.compose(&configuration, true).unwrap().materialize();
            prop_assert!(
                composed.structurally_eq(&tree(values)),
                "{} does not reproduce its commit",
                configuration
            );
        }
    }

    #[test]
    fn ordered_lines_round_trip_in_both_modes(
        (masks, files) in distinct_masks().prop_flat_map(|masks| {
            let n = masks.len();
            (
                Just(masks),
                proptest::collection::vec(
                    proptest::collection::vec(prop::sample::select(vec!["a", "b", "c", "}"]), 0..6),
                    n,
                ),
            )
        })
    ) {
        let mut repo = Repository::new(2);
        for (mask, lines) in masks.iter().zip(&files) {
            repo.extract(&complete_configuration(*mask), source_file(lines), None).unwrap();
        }
        for (mask, lines) in masks.iter().zip(&files) {
            let configuration = complete_configuration(*mask);
            let lazy = repo.compose(&configuration, true).unwrap();
            let eager = repo.compose(&configuration, false).unwrap();
            let lazy_tree = lazy.materialize();
            prop_assert!(lazy_tree.structurally_eq(&eager.materialize()));
            prop_assert_eq!(lazy.order_warnings(), eager.order_warnings());
            prop_assert!(
                lazy_tree.structurally_eq(&source_file(lines)),
                "{} does not reproduce its lines",
                configuration
            );
        }
    }

    #[test]
    fn subset_keeps_variants_without_the_removed_revision(
        commits in proptest::collection::vec(commit_strategy(), 1..5)
    ) {
        let mut repo = Repository::new(2);
        for (signs, values) in &commits {
            repo.extract(&configuration(signs), tree(values), None).unwrap();
        }
        let removed = RevisionRef::new("C", "1");
        let deselected: BTreeSet<RevisionRef> = [removed.clone()].into_iter().collect();
        let subset = repo.subset(&deselected, 2).unwrap();

        for (signs, _) in &commits {
            let configuration = configuration(signs);
            if configuration.selects(&removed) {
                continue;
            }
            let expected = repo.compose(&configuration, true).unwrap().materialize();
            let actual = subset.compose(&configuration, true).unwrap().materialize();
            prop_assert!(
                actual.structurally_eq(&expected),
                "{} changed by removing C.1",
                configuration
            );
        }
    }
}
