//! End-to-end command flow: commit variant directories, check out, inspect.

use clap::Parser;
use std::fs;
use std::path::Path;
use strata::cli::{Cli, OutputFormat, RunContext};
use strata::config::StrataConfig;
use tempfile::TempDir;

struct Workspace {
    _temp_dir: TempDir,
    root: std::path::PathBuf,
    ctx: RunContext,
}

impl Workspace {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("ws");
        fs::create_dir(&root).unwrap();
        let ctx = RunContext::with_config(root.clone(), StrataConfig::default(), OutputFormat::Json)
            .unwrap();
        Self {
            _temp_dir: temp_dir,
            root,
            ctx,
        }
    }

    fn run(&self, args: &[&str]) -> serde_json::Value {
        let mut argv = vec!["strata"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let output = self.ctx.execute(&cli.command).unwrap();
        serde_json::from_str(&output).unwrap()
    }

    fn variant(&self, name: &str, files: &[(&str, &str)]) -> String {
        let dir = self.root.join("..").join(name);
        for (path, contents) in files {
            let path = dir.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        dir.to_string_lossy().into_owned()
    }

    fn out(&self, name: &str) -> String {
        self.root.join("..").join(name).to_string_lossy().into_owned()
    }
}

fn read(dir: &str, path: &str) -> String {
    fs::read_to_string(Path::new(dir).join(path)).unwrap()
}

#[test]
fn test_commit_and_checkout_variants() {
    let ws = Workspace::new();
    let with_b = ws.variant(
        "v1",
        &[("src/main.c", "int main() {\n  feature_b();\n  return 0;\n}\n")],
    );
    let without_b = ws.variant(
        "v2",
        &[
            ("src/main.c", "int main() {\n  return 0;\n}\n"),
            ("README", "plain build\n"),
        ],
    );

    let commit = ws.run(&["commit", "A, B", "--source", &with_b, "-m", "with b"]);
    assert_eq!(commit["configuration"], "A.1, B.1");
    ws.run(&["commit", "A, -B", "--source", &without_b]);

    let out_b = ws.out("out-b");
    let report = ws.run(&["checkout", "A, B", "--output", &out_b]);
    assert_eq!(report["files"], 1);
    assert_eq!(
        read(&out_b, "src/main.c"),
        "int main() {\n  feature_b();\n  return 0;\n}\n"
    );
    assert!(!Path::new(&out_b).join("README").exists());

    let out_plain = ws.out("out-plain");
    ws.run(&["checkout", "A, -B", "--output", &out_plain, "--eager"]);
    assert_eq!(read(&out_plain, "src/main.c"), "int main() {\n  return 0;\n}\n");
    assert_eq!(read(&out_plain, "README"), "plain build\n");
}

#[test]
fn test_listings_after_commits() {
    let ws = Workspace::new();
    let v1 = ws.variant("v1", &[("a.txt", "x\ny\n")]);
    let v2 = ws.variant("v2", &[("a.txt", "x\nz\n")]);
    ws.run(&["commit", "A, B", "--source", &v1]);
    ws.run(&["commit", "A, -B", "--source", &v2]);

    let features = ws.run(&["features"]);
    assert_eq!(features.as_array().unwrap().len(), 2);
    let log = ws.run(&["log"]);
    assert_eq!(log.as_array().unwrap().len(), 2);
    let associations = ws.run(&["associations"]);
    assert_eq!(associations.as_array().unwrap().len(), 3);
    let modules = ws.run(&["modules"]);
    assert!(!modules.as_array().unwrap().is_empty());

    let status = ws.run(&["status"]);
    assert_eq!(status["commits"], 2);
    assert_eq!(status["digest"].as_str().unwrap().len(), 64);
    assert_eq!(ws.run(&["consolidate"])["merged"], 0);
}

#[test]
fn test_subset_and_merge_between_stores() {
    let ws = Workspace::new();
    let v1 = ws.variant("v1", &[("a.txt", "x\ny\n")]);
    let v2 = ws.variant("v2", &[("a.txt", "x\nz\n")]);
    ws.run(&["commit", "A, B", "--source", &v1]);
    ws.run(&["commit", "A, -B", "--source", &v2]);

    let target = ws.out("subset-store");
    let subset = ws.run(&["subset", "B.1", "--target", &target]);
    assert_eq!(subset["features"], 1);

    // the target already holds a repository now
    let argv = ["strata", "subset", "B.1", "--target", target.as_str()];
    let cli = Cli::try_parse_from(argv).unwrap();
    assert!(ws.ctx.execute(&cli.command).is_err());

    let other = Workspace::new();
    let merged = other.run(&["merge", &target]);
    assert_eq!(merged["associations_before"], 0);
    assert_eq!(merged["features"], 1);

    let out = other.out("merged-out");
    other.run(&["checkout", "A", "--output", &out]);
    assert_eq!(read(&out, "a.txt"), "x\nz\n");
}
