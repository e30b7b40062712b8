//! Persistence of whole repositories in the sled store.

use crate::integration::test_utils::{checkout_values, config, items, set, two_variant_repository};
use strata::concurrency::SharedRepository;
use strata::store::{RepositoryStore, SledRepositoryStore};
use strata::Repository;
use tempfile::TempDir;

#[test]
fn test_reopened_store_composes_the_same_variants() {
    let temp_dir = TempDir::new().unwrap();
    let repo = two_variant_repository();
    {
        let store = SledRepositoryStore::new(temp_dir.path()).unwrap();
        store.save(&repo).unwrap();
        store.flush().unwrap();
    }

    let store = SledRepositoryStore::new(temp_dir.path()).unwrap();
    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded, repo);
    assert_eq!(loaded.digest().unwrap(), repo.digest().unwrap());
    assert_eq!(checkout_values(&loaded, "A, -B"), set(&["dir", "x", "z"]));
}

#[test]
fn test_ids_continue_after_reload() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledRepositoryStore::new(temp_dir.path()).unwrap();
    let repo = two_variant_repository();
    store.save(&repo).unwrap();

    let mut loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.next_association_id(), repo.next_association_id());
    loaded.extract(&config("C"), items(&["c"]), None).unwrap();
    let newest = *loaded.associations().keys().last().unwrap();
    assert!(newest >= repo.next_association_id());
}

#[test]
fn test_shared_repository_snapshot_persists() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledRepositoryStore::new(temp_dir.path()).unwrap();
    let shared = SharedRepository::new(Repository::new(2));
    shared
        .extract(&config("A"), items(&["x"]), Some("shared".to_string()))
        .unwrap();

    store.save(&shared.snapshot()).unwrap();
    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.commits().len(), 1);
    assert_eq!(
        shared.checkout(&config("A")).unwrap().selected.len(),
        loaded.compose(&config("A"), true).unwrap().selected.len()
    );
}
