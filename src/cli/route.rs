//! CLI route: single route table and run context. Loads the repository,
//! calls the engine and hands results to presentation.

use crate::cli::command_name;
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{self, CheckoutReport, StatusReport};
use crate::config::{ConfigLoader, StrataConfig};
use crate::error::{ApiError, StorageError};
use crate::feature::{Configuration, FeatureInstance};
use crate::repository::Repository;
use crate::store::{RepositoryStore, SledRepositoryStore};
use crate::text::{ArtifactReader, ArtifactWriter, TextReader, TextWriter};
use crate::types::{hash_to_hex, RevisionRef};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, info_span};

/// Runtime context for CLI execution: workspace, configuration and store.
pub struct RunContext {
    workspace_root: PathBuf,
    config: StrataConfig,
    store_path: PathBuf,
    store: SledRepositoryStore,
    format: OutputFormat,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        format: OutputFormat,
    ) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::new().load(&workspace_root)?,
        };
        Self::with_config(workspace_root, config, format)
    }

    /// Create run context from an already loaded configuration.
    pub fn with_config(
        workspace_root: PathBuf,
        config: StrataConfig,
        format: OutputFormat,
    ) -> Result<Self, ApiError> {
        let store_path = config.storage.resolve(&workspace_root);
        std::fs::create_dir_all(&store_path).map_err(StorageError::from)?;
        let store = SledRepositoryStore::new(&store_path)?;
        Ok(Self {
            workspace_root,
            config,
            store_path,
            store,
            format,
        })
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// The stored repository, or an empty one with the configured order bound.
    pub fn load_repository(&self) -> Result<Repository, ApiError> {
        Ok(self
            .store
            .load()?
            .unwrap_or_else(|| Repository::new(self.config.repository.max_order)))
    }

    fn save(&self, repository: &Repository) -> Result<(), ApiError> {
        self.store.save(repository)?;
        self.store.flush()?;
        Ok(())
    }

    /// Execute a command and return its rendered output.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let span = info_span!("command", name = command_name(command));
        let _entered = span.enter();
        let start = Instant::now();
        let result = self.route(command);
        info!(
            ok = result.is_ok(),
            duration_ms = start.elapsed().as_millis(),
            "command finished"
        );
        result
    }

    fn route(&self, command: &Commands) -> Result<String, ApiError> {
        let json = self.format == OutputFormat::Json;
        match command {
            Commands::Commit {
                configuration,
                message,
                source,
            } => {
                let configuration = Configuration::parse(configuration)?;
                let source = source.as_deref().unwrap_or(&self.workspace_root);
                let tree = TextReader::new(self.config.reader.clone()).read(source)?;
                let mut repository = self.load_repository()?;
                let commit = repository.extract(&configuration, tree, message.clone())?;
                self.save(&repository)?;
                presentation::format_commit(&commit, json)
            }
            Commands::Checkout {
                configuration,
                output,
                eager,
                force,
            } => {
                let configuration = Configuration::parse(configuration)?;
                check_output_dir(output, *force)?;
                let repository = self.load_repository()?;
                let checkout = repository.compose(&configuration, !*eager)?.into_materialized();
                let files = TextWriter::new().write(output, &checkout.tree)?;
                presentation::format_checkout(
                    &CheckoutReport {
                        output: output.clone(),
                        files,
                        checkout: &checkout,
                    },
                    json,
                )
            }
            Commands::Features => {
                let repository = self.load_repository()?;
                presentation::format_features(repository.features().values(), json)
            }
            Commands::Associations => {
                let repository = self.load_repository()?;
                presentation::format_associations(&repository.association_summaries(), json)
            }
            Commands::Modules => {
                let repository = self.load_repository()?;
                presentation::format_modules(&repository.module_stats(), json)
            }
            Commands::Log => {
                let repository = self.load_repository()?;
                presentation::format_log(repository.commits(), json)
            }
            Commands::Subset {
                revisions,
                max_order,
                target,
            } => {
                let deselected = parse_revisions(revisions)?;
                let repository = self.load_repository()?;
                let max_order = max_order.unwrap_or(repository.max_order());
                let target_store = open_other_store(target)?;
                if target_store.exists()? {
                    return Err(ApiError::InvalidArgument(format!(
                        "{} already holds a repository",
                        target.display()
                    )));
                }
                let subset = repository.subset(&deselected, max_order)?;
                target_store.save(&subset)?;
                target_store.flush()?;
                presentation::format_subset(target, &subset, json)
            }
            Commands::Merge { source } => {
                let other = open_other_store(source)?.load()?.ok_or_else(|| {
                    ApiError::InvalidArgument(format!("{} holds no repository", source.display()))
                })?;
                let mut repository = self.load_repository()?;
                let before = repository.associations().len();
                repository.merge(other)?;
                self.save(&repository)?;
                presentation::format_merge(before, &repository, json)
            }
            Commands::Consolidate => {
                let mut repository = self.load_repository()?;
                let merged = repository.consolidate_associations()?;
                if merged > 0 {
                    self.save(&repository)?;
                }
                presentation::format_consolidate(merged, repository.associations().len(), json)
            }
            Commands::Status => {
                let repository = self.load_repository()?;
                let digest = repository.digest()?;
                presentation::format_status(
                    &StatusReport {
                        store: self.store_path.clone(),
                        max_order: repository.max_order(),
                        features: repository.features().len(),
                        modules: repository.modules().len(),
                        associations: repository.associations().len(),
                        artifacts: repository.artifact_count(),
                        commits: repository.commits().len(),
                        digest: hash_to_hex(&digest),
                    },
                    json,
                )
            }
        }
    }
}

/// Revisions named on the command line; a bare feature means its first revision.
fn parse_revisions(revisions: &[String]) -> Result<BTreeSet<RevisionRef>, ApiError> {
    if revisions.is_empty() {
        return Err(ApiError::InvalidArgument(
            "no revisions to remove".to_string(),
        ));
    }
    revisions
        .iter()
        .map(|r| {
            let instance: FeatureInstance = r.parse()?;
            if !instance.positive {
                return Err(ApiError::InvalidArgument(format!(
                    "'{}' is negated; name revisions to remove without '-'",
                    r
                )));
            }
            Ok(instance.revision)
        })
        .collect()
}

fn open_other_store(path: &Path) -> Result<SledRepositoryStore, ApiError> {
    std::fs::create_dir_all(path).map_err(StorageError::from)?;
    Ok(SledRepositoryStore::new(path)?)
}

fn check_output_dir(output: &Path, force: bool) -> Result<(), ApiError> {
    if force || !output.exists() {
        return Ok(());
    }
    if !output.is_dir() {
        return Err(ApiError::InvalidArgument(format!(
            "{} is not a directory",
            output.display()
        )));
    }
    let mut entries = std::fs::read_dir(output).map_err(StorageError::from)?;
    if entries.next().is_some() {
        return Err(ApiError::InvalidArgument(format!(
            "{} is not empty (use --force to write into it)",
            output.display()
        )));
    }
    Ok(())
}
