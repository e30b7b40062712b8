use crate::integration::test_utils::{
    config, owner_of, referencing_repository, set, two_variant_repository, values,
};
use strata::artifact::ArtifactData;
use strata::text::reader::text_file;
use strata::tree::RootNode;
use strata::Repository;

fn file_tree(lines: &str) -> RootNode {
    RootNode::new().with_child(text_file("main.c".to_string(), lines))
}

fn lines(tree: &RootNode) -> Vec<String> {
    tree.children[0]
        .children
        .iter()
        .filter_map(|n| match &n.artifact.data {
            ArtifactData::Line { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_lazy_and_eager_agree_for_every_configuration() {
    let repo = two_variant_repository();
    for configuration in ["A", "A, B", "A, -B", "B", "A, B, C"] {
        let lazy = repo.compose(&config(configuration), true).unwrap();
        let eager = repo.compose(&config(configuration), false).unwrap();
        assert_eq!(lazy.selected, eager.selected, "{}", configuration);
        assert_eq!(lazy.order_warnings(), eager.order_warnings());
        assert!(lazy.materialize().structurally_eq(&eager.materialize()));
    }
}

#[test]
fn test_ordered_lines_follow_sequence_graph() {
    let mut repo = Repository::new(2);
    repo.extract(&config("A, B"), file_tree("int main\nfeature_b();\nreturn 0;\n"), None)
        .unwrap();
    repo.extract(&config("A, -B"), file_tree("int main\nreturn 0;\n"), None)
        .unwrap();

    let with_b = repo.compose(&config("A, B"), false).unwrap().into_materialized();
    assert_eq!(lines(&with_b.tree), vec!["int main", "feature_b();", "return 0;"]);
    assert!(with_b.warnings.is_empty());

    let without_b = repo.compose(&config("A, -B"), true).unwrap().into_materialized();
    assert_eq!(lines(&without_b.tree), vec!["int main", "return 0;"]);
}

#[test]
fn test_unordered_alternatives_are_reported() {
    let mut repo = Repository::new(2);
    // two edits of the same variant with no order between them
    repo.extract(&config("A"), file_tree("one\ntwo\n"), None).unwrap();
    repo.extract(&config("A"), file_tree("one\nthree\n"), None).unwrap();

    let checkout = repo.compose(&config("A"), true).unwrap().into_materialized();
    let composed = lines(&checkout.tree);
    assert_eq!(composed.len(), 3);
    assert_eq!(composed[0], "one");
    assert_eq!(checkout.warnings.len(), 1);
    assert_eq!(checkout.warnings[0].parent, "main.c");

    // the same tie-break every time
    let again = repo.compose(&config("A"), false).unwrap().into_materialized();
    assert_eq!(lines(&again.tree), composed);
    assert_eq!(again.warnings, checkout.warnings);
}

#[test]
fn test_unknown_feature_reports_missing_modules() {
    let repo = two_variant_repository();
    let checkout = repo.compose(&config("A, B, C"), true).unwrap();
    assert_eq!(values(&checkout.materialize()), set(&["dir", "x", "y"]));
    assert!(checkout.missing.iter().any(|m| m.pos().contains("C")));
}

#[test]
fn test_empty_repository_composes_empty_tree() {
    let repo = Repository::new(2);
    let checkout = repo.compose(&config("A"), true).unwrap();
    assert!(checkout.selected.is_empty());
    assert!(checkout.materialize().is_empty());
    assert!(checkout.missing.is_empty());
}

#[test]
fn test_references_to_unselected_content_are_reported() {
    let repo = referencing_repository();
    let definition = owner_of(&repo, "def");

    let checkout = repo.compose(&config("A"), true).unwrap();
    assert!(!checkout.selected.contains(&definition));
    assert_eq!(checkout.unresolved.iter().copied().collect::<Vec<_>>(), vec![definition]);
    assert_eq!(values(&checkout.materialize()), set(&["dir", "use"]));

    let definition_only = repo.compose(&config("B"), false).unwrap();
    assert!(definition_only.selected.contains(&definition));
    assert!(definition_only.unresolved.is_empty());
    assert_eq!(values(&definition_only.materialize()), set(&["dir", "def"]));
}
