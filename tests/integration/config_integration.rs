//! Layered configuration: defaults, files and `STRATA_*` variables.

use crate::integration::test_utils::with_env;
use std::path::PathBuf;
use strata::cli::{OutputFormat, RunContext};
use strata::config::ConfigLoader;
use strata::logging::LogOutput;
use tempfile::TempDir;

fn loader() -> ConfigLoader {
    ConfigLoader::new().with_global_file(None)
}

#[test]
fn test_environment_overrides_workspace_file() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join(".strata")).unwrap();
    std::fs::write(
        temp_dir.path().join(".strata/config.toml"),
        "[repository]\nmax_order = 3\n\n[logging]\noutput = \"file\"\n",
    )
    .unwrap();

    let config = with_env(&[("STRATA_REPOSITORY__MAX_ORDER", "1")], || {
        loader().load(temp_dir.path()).unwrap()
    });
    assert_eq!(config.repository.max_order, 1);
    assert_eq!(config.logging.output, LogOutput::File);

    let without_env = loader().with_environment(false).load(temp_dir.path()).unwrap();
    assert_eq!(without_env.repository.max_order, 3);
}

#[test]
fn test_invalid_environment_value_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let result = with_env(&[("STRATA_REPOSITORY__MAX_ORDER", "99")], || {
        loader().load(temp_dir.path())
    });
    assert!(result.is_err());
}

#[test]
fn test_run_context_uses_configured_store_and_order() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("ws");
    let config_path = temp_dir.path().join("strata.toml");
    std::fs::create_dir(&workspace).unwrap();
    std::fs::write(
        &config_path,
        "[repository]\nmax_order = 1\n\n[storage]\nstore_path = \"db\"\n",
    )
    .unwrap();

    let ctx = RunContext::new(workspace.clone(), Some(config_path), OutputFormat::Json).unwrap();
    assert_eq!(ctx.config().storage.store_path, PathBuf::from("db"));
    assert!(workspace.join("db").is_dir());
    assert_eq!(ctx.load_repository().unwrap().max_order(), 1);
}
