//! Integration tests for the Strata configuration management engine

mod cli_workflow;
mod composition;
mod config_integration;
mod repository_ops;
mod scenario;
mod store_integration;
mod test_utils;
