//! CLI presentation: text tables and JSON documents for command results.

use crate::composition::MaterializedCheckout;
use crate::error::ApiError;
use crate::feature::Feature;
use crate::repository::query::{AssociationSummary, ModuleStat};
use crate::repository::{Commit, Repository};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

pub struct CheckoutReport<'a> {
    pub output: PathBuf,
    pub files: usize,
    pub checkout: &'a MaterializedCheckout,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub store: PathBuf,
    pub max_order: usize,
    pub features: usize,
    pub modules: usize,
    pub associations: usize,
    pub artifacts: usize,
    pub commits: usize,
    pub digest: String,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::InvariantViolation(format!("failed to render JSON: {}", e)))
}

fn heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_commit(commit: &Commit, json: bool) -> Result<String, ApiError> {
    if json {
        return to_json(&json!({
            "id": commit.id,
            "configuration": commit.configuration.to_string(),
            "timestamp": commit.timestamp.to_rfc3339(),
            "message": commit.message,
            "associations": commit.associations.iter().map(|a| a.0).collect::<Vec<_>>(),
        }));
    }
    Ok(format!(
        "Committed {} as {} ({} new association(s))",
        commit.configuration.to_string().bold(),
        commit.short_id().yellow(),
        commit.associations.len()
    ))
}

pub fn format_checkout(report: &CheckoutReport<'_>, json: bool) -> Result<String, ApiError> {
    let checkout = report.checkout;
    if json {
        return to_json(&json!({
            "configuration": checkout.configuration.to_string(),
            "output": report.output,
            "files": report.files,
            "selected": checkout.selected.iter().map(|a| a.0).collect::<Vec<_>>(),
            "missing": checkout.missing.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
            "surplus": checkout.surplus.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
            "unresolved": checkout.unresolved.iter().map(|a| a.0).collect::<Vec<_>>(),
            "warnings": checkout.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
        }));
    }

    let mut lines = vec![format!(
        "Checked out {} into {}: {} file(s) from {} association(s)",
        checkout.configuration.to_string().bold(),
        report.output.display(),
        report.files,
        checkout.selected.len()
    )];
    if !checkout.missing.is_empty() {
        lines.push(String::new());
        lines.push(heading("Missing modules"));
        lines.extend(checkout.missing.iter().map(|m| format!("  {}", m)));
    }
    if !checkout.surplus.is_empty() {
        lines.push(String::new());
        lines.push(heading("Surplus modules"));
        lines.extend(checkout.surplus.iter().map(|m| format!("  {}", m)));
    }
    if !checkout.unresolved.is_empty() {
        let ids: Vec<String> = checkout.unresolved.iter().map(|a| a.to_string()).collect();
        lines.push(String::new());
        lines.push(format!(
            "{} unresolved associations: {}",
            "warning:".yellow().bold(),
            ids.join(", ")
        ));
    }
    for warning in &checkout.warnings {
        lines.push(format!("{} {}", "warning:".yellow().bold(), warning));
    }
    Ok(lines.join("\n"))
}

pub fn format_features<'a>(
    features: impl Iterator<Item = &'a Feature>,
    json: bool,
) -> Result<String, ApiError> {
    let features: Vec<&Feature> = features.collect();
    if json {
        let rows: Vec<_> = features
            .iter()
            .map(|f| {
                json!({
                    "id": f.id(),
                    "name": f.name,
                    "revisions": f.revisions().iter().map(|r| &r.id).collect::<Vec<_>>(),
                })
            })
            .collect();
        return to_json(&rows);
    }
    if features.is_empty() {
        return Ok("No features.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Feature", "Revisions", "Latest"]);
    for feature in features {
        let revisions: Vec<&str> = feature.revisions().iter().map(|r| r.id.as_str()).collect();
        table.add_row(vec![
            feature.id().clone(),
            revisions.join(", "),
            feature
                .latest_revision()
                .map(|r| r.id.clone())
                .unwrap_or_default(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_associations(summaries: &[AssociationSummary], json: bool) -> Result<String, ApiError> {
    if json {
        return to_json(&summaries);
    }
    if summaries.is_empty() {
        return Ok("No associations.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Id", "Condition", "Artifacts", "Count"]);
    for summary in summaries {
        table.add_row(vec![
            summary.id.to_string(),
            summary.condition.clone(),
            summary.artifacts.to_string(),
            summary.count.to_string(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_modules(stats: &[ModuleStat], json: bool) -> Result<String, ApiError> {
    if json {
        return to_json(&stats);
    }
    if stats.is_empty() {
        return Ok("No modules.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Module", "Order", "Count", "Revisions"]);
    for stat in stats {
        table.add_row(vec![
            stat.module.clone(),
            stat.order.to_string(),
            stat.count.to_string(),
            stat.revisions.to_string(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_log(commits: &[Commit], json: bool) -> Result<String, ApiError> {
    if json {
        let rows: Vec<_> = commits
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "configuration": c.configuration.to_string(),
                    "timestamp": c.timestamp.to_rfc3339(),
                    "message": c.message,
                })
            })
            .collect();
        return to_json(&rows);
    }
    if commits.is_empty() {
        return Ok("No commits.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Commit", "Date", "Configuration", "Message"]);
    for commit in commits.iter().rev() {
        table.add_row(vec![
            commit.short_id().to_string(),
            commit.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            commit.configuration.to_string(),
            commit.message.clone().unwrap_or_default(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_subset(target: &Path, subset: &Repository, json: bool) -> Result<String, ApiError> {
    if json {
        return to_json(&json!({
            "target": target,
            "features": subset.features().len(),
            "associations": subset.associations().len(),
            "max_order": subset.max_order(),
        }));
    }
    Ok(format!(
        "Wrote subset to {}: {} feature(s), {} association(s)",
        target.display(),
        subset.features().len(),
        subset.associations().len()
    ))
}

pub fn format_merge(before: usize, merged: &Repository, json: bool) -> Result<String, ApiError> {
    if json {
        return to_json(&json!({
            "associations_before": before,
            "associations": merged.associations().len(),
            "features": merged.features().len(),
        }));
    }
    Ok(format!(
        "Merged: {} -> {} association(s), {} feature(s)",
        before,
        merged.associations().len(),
        merged.features().len()
    ))
}

pub fn format_consolidate(merged: usize, remaining: usize, json: bool) -> Result<String, ApiError> {
    if json {
        return to_json(&json!({ "merged": merged, "associations": remaining }));
    }
    if merged == 0 {
        return Ok("Nothing to consolidate.".to_string());
    }
    Ok(format!(
        "Consolidated {} association(s); {} remain",
        merged, remaining
    ))
}

pub fn format_status(report: &StatusReport, json: bool) -> Result<String, ApiError> {
    if json {
        return to_json(report);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    for (label, value) in [
        ("Store", report.store.display().to_string()),
        ("Max order", report.max_order.to_string()),
        ("Features", report.features.to_string()),
        ("Modules", report.modules.to_string()),
        ("Associations", report.associations.to_string()),
        ("Artifacts", report.artifacts.to_string()),
        ("Commits", report.commits.to_string()),
        ("Digest", report.digest.clone()),
    ] {
        table.add_row(vec![label.to_string(), value]);
    }
    Ok(format!("{}\n{}", heading("Repository"), table))
}
