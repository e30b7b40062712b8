//! Shared test utilities for integration tests

use std::collections::BTreeSet;
use std::sync::Mutex;
use strata::artifact::{Artifact, ArtifactData};
use strata::tree::ops::key_of;
use strata::tree::{Node, RootNode};
use strata::{AssociationId, Configuration, Repository};

/// Serializes tests that touch `STRATA_*` environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub fn config(s: &str) -> Configuration {
    Configuration::parse(s).unwrap()
}

pub fn item(value: &str) -> Node {
    Node::new(Artifact::new(ArtifactData::Generic {
        kind: "item".to_string(),
        value: value.to_string(),
    }))
}

/// `dir { values... }`
pub fn items(values: &[&str]) -> RootNode {
    RootNode::new().with_child(item("dir").with_children(values.iter().map(|v| item(v))))
}

/// Values of all generic artifacts in a tree.
pub fn values(tree: &RootNode) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    tree.visit(|_, node| {
        if let ArtifactData::Generic { value, .. } = &node.artifact.data {
            found.insert(value.clone());
        }
    });
    found
}

pub fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// The two-variant repository: `{A, B}` with `{x, y}` and `{A, -B}` with `{x, z}`.
pub fn two_variant_repository() -> Repository {
    let mut repo = Repository::new(2);
    repo.extract(&config("A, B"), items(&["x", "y"]), Some("first".to_string()))
        .unwrap();
    repo.extract(&config("A, -B"), items(&["x", "z"]), Some("second".to_string()))
        .unwrap();
    repo
}

/// `{B}` defines `dir/def`, `{A}` adds `dir/use` referencing it.
pub fn referencing_repository() -> Repository {
    let mut repo = Repository::new(2);
    let definition = items(&["def"]);
    let target = key_of(&definition, &["item:dir", "item:def"]).unwrap();
    repo.extract(&config("B"), definition, None).unwrap();

    let usage = Node::new(
        Artifact::new(ArtifactData::Generic {
            kind: "item".to_string(),
            value: "use".to_string(),
        })
        .with_reference(target),
    );
    repo.extract(&config("A"), RootNode::new().with_child(item("dir").with_child(usage)), None)
        .unwrap();
    repo
}

/// Id of the association owning the generic artifact with `value`.
pub fn owner_of(repo: &Repository, value: &str) -> AssociationId {
    repo.associations()
        .values()
        .find(|a| {
            let mut owned = false;
            a.tree.visit(|_, node| {
                if node.unique {
                    if let ArtifactData::Generic { value: v, .. } = &node.artifact.data {
                        owned |= v == value;
                    }
                }
            });
            owned
        })
        .map(|a| a.id())
        .unwrap()
}

/// Composed artifact values for a configuration.
pub fn checkout_values(repo: &Repository, configuration: &str) -> BTreeSet<String> {
    let checkout = repo.compose(&config(configuration), true).unwrap();
    values(&checkout.materialize())
}

/// Run `f` with the given `STRATA_*` variables set, restoring them afterwards.
pub fn with_env<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let previous: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(k, _)| (k.to_string(), std::env::var(k).ok()))
        .collect();
    for (k, v) in vars {
        std::env::set_var(k, v);
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (k, v) in previous {
        match v {
            Some(v) => std::env::set_var(&k, v),
            None => std::env::remove_var(&k),
        }
    }
    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}
