use nu_ansi_term::Color::{Cyan, Green, Red, Yellow};
use sleet_core::FeedSettings;
use sleet_operations::{PruneReport, PushReport, StatsReport, ValidateReport};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::info;

use crate::utils::Colored;

fn render(title: &str, builder: Builder) -> String {
    builder
        .build()
        .with(Panel::header(title))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string()
}

pub fn display_validation(report: &ValidateReport) {
    let mut builder = Builder::new();
    builder.push_record(["Service", "Missing", "Extra", "Status"]);
    for service in &report.services {
        let status = if service.is_valid() {
            Colored(Green, "OK").to_string()
        } else {
            Colored(Red, "INVALID").to_string()
        };
        builder.push_record([
            service.service.to_string(),
            service.missing.len().to_string(),
            service.extra.len().to_string(),
            status,
        ]);
    }
    info!("\n{}", render("Feed Validation", builder));
}

pub fn display_stats(report: &StatsReport, settings_symbols: bool) {
    let mut builder = Builder::new();
    builder.push_record(["Packages".to_string(), report.packages.to_string()]);
    builder.push_record(["Package ids".to_string(), report.ids.to_string()]);
    if settings_symbols || report.symbols_packages > 0 {
        builder.push_record([
            "Symbols packages".to_string(),
            report.symbols_packages.to_string(),
        ]);
    }
    info!("\n{}", render("Feed Stats", builder));
}

pub fn display_settings(settings: &FeedSettings) {
    let mut builder = Builder::new();
    for (key, value) in settings.entries() {
        builder.push_record([Colored(Cyan, key).to_string(), value]);
    }
    info!("\n{}", render("Feed Settings", builder));
}

pub fn display_push(report: &PushReport) {
    if report.skipped.is_empty() {
        return;
    }
    info!(
        "{} package(s) skipped",
        Colored(Yellow, report.skipped.len())
    );
}

pub fn display_prune(report: &PruneReport) {
    if report.dry_run && !report.pruned.is_empty() {
        info!(
            "{} package(s) would be removed, run again without {} to remove them",
            Colored(Yellow, report.pruned.len()),
            Colored(Green, "--dry-run")
        );
    }
}
