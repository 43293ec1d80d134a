//! Human-readable run reports.

use std::collections::BTreeMap;

use colored::Colorize;
use wfgraph_fetch::DownloadReport;
use wfgraph_ingest::{DownloadOutcome, IngestReport};
use wfgraph_model::{EdgeKind, NodeLabel};
use wfgraph_store::{GraphSummary, ServerComponent};

/// Failures listed individually before collapsing into a count.
const MAX_LISTED: usize = 10;

pub fn print_download(outcome: &DownloadOutcome) {
    let DownloadReport { saved, failed } = &outcome.report;
    println!(
        "{} index -> {}",
        "saved".green().bold(),
        outcome.index_path.display()
    );
    println!(
        "{} {}/{} manifests downloaded",
        "ok".green().bold(),
        saved.len(),
        outcome.manifests
    );
    if !failed.is_empty() {
        println!("{} {} manifests failed", "warning:".yellow().bold(), failed.len());
        for failure in failed.iter().take(MAX_LISTED) {
            println!("  {} {}: {}", "-".yellow(), failure.id, failure.error);
        }
        if failed.len() > MAX_LISTED {
            println!("  ... and {} more", failed.len() - MAX_LISTED);
        }
    }
}

pub fn print_ingest(report: &IngestReport) {
    if report.cleared {
        println!("{} existing graph cleared", "ok".green().bold());
    }
    for skipped in &report.skipped_manifests {
        println!("{} {}", "warning:".yellow().bold(), skipped);
    }
    if !report.rejected.is_empty() {
        println!(
            "{} {} records failed validation",
            "warning:".yellow().bold(),
            report.rejected.len()
        );
        for failure in report.rejected.iter().take(MAX_LISTED) {
            println!("  {} {}", "-".yellow(), failure);
        }
        if report.rejected.len() > MAX_LISTED {
            println!("  ... and {} more", report.rejected.len() - MAX_LISTED);
        }
    }

    println!();
    println!("{}", "Ingested".bold());
    row("resources", report.resources.upserted, report.resources.failed);
    row("weapons", report.weapons.nodes.upserted, report.weapons.nodes.failed);
    row("recipes", report.recipes.nodes.upserted, report.recipes.nodes.failed);
    println!(
        "  {:<20} {:>8}",
        "categories", report.weapons.categories
    );

    println!("{}", "Links".bold());
    println!("  {:<20} {:>8}", "BELONGS_TO", report.weapons.belongs_to);
    println!(
        "  {:<20} {:>8}  ({} weapon, {} resource)",
        "BUILDS",
        report.recipes.builds(),
        report.recipes.builds_weapon,
        report.recipes.builds_resource
    );
    println!("  {:<20} {:>8}", "REQUIRES", report.recipes.requires);
    if report.recipes.unresolved_builds > 0 || report.recipes.unresolved_ingredients > 0 {
        println!(
            "  {} {} result types and {} ingredients are outside the ingested set",
            "note:".cyan(),
            report.recipes.unresolved_builds,
            report.recipes.unresolved_ingredients
        );
    }
    let failed_edges = report.weapons.failed_edges + report.recipes.failed_edges;
    if failed_edges > 0 {
        println!("  {} {} edge writes failed", "warning:".yellow().bold(), failed_edges);
    }

    print_summary(&report.summary);
}

fn row(name: &str, upserted: usize, failed: usize) {
    if failed == 0 {
        println!("  {:<20} {:>8}", name, upserted);
    } else {
        println!(
            "  {:<20} {:>8}  {}",
            name,
            upserted,
            format!("({failed} failed)").red()
        );
    }
}

pub fn print_summary(summary: &GraphSummary) {
    println!();
    println!("{}", "Graph summary".bold());

    println!("  {}", "Nodes".underline());
    let labels = NodeLabel::ALL.map(|l| l.as_str());
    for (label, count) in ordered(&summary.nodes, &labels) {
        println!("    {:<18} {:>8}", label, count);
    }

    println!("  {}", "Relationships".underline());
    let kinds = EdgeKind::ALL.map(|k| k.as_str());
    for (kind, count) in ordered(&summary.edges, &kinds) {
        println!("    {:<18} {:>8}", kind, count);
    }

    println!(
        "  {:<20} {:>8} nodes, {} relationships",
        "total".bold(),
        summary.nodes.values().sum::<u64>(),
        summary.edges.values().sum::<u64>()
    );
}

pub fn print_components(components: &[ServerComponent]) {
    for component in components {
        println!(
            "  {} {} ({})",
            component.name.bold(),
            component.versions.join(", "),
            component.edition
        );
    }
}

/// Known keys first in their canonical order (zero if absent), then any
/// others the store reported.
fn ordered<'a>(counts: &'a BTreeMap<String, u64>, known: &[&'a str]) -> Vec<(&'a str, u64)> {
    let mut rows: Vec<(&str, u64)> = known
        .iter()
        .map(|k| (*k, counts.get(*k).copied().unwrap_or(0)))
        .collect();
    rows.extend(
        counts
            .iter()
            .filter(|(k, _)| !known.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), *v)),
    );
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_rows_come_first_and_default_to_zero() {
        let counts = BTreeMap::from([
            ("Weapon".to_string(), 3),
            ("Legacy".to_string(), 1),
        ]);
        let rows = ordered(&counts, &["Weapon", "Resource"]);
        assert_eq!(rows, [("Weapon", 3), ("Resource", 0), ("Legacy", 1)]);
    }
}
