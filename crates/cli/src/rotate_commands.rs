use std::{process::ExitCode, sync::Arc};

use {
    clap::Args,
    credvault_config::CredvaultConfig,
    credvault_rotation::{
        RotationOptions, RotationOrchestrator, RotationStatistics, UsageReport, UsageReporter,
    },
    credvault_vault::KeyRegistry,
};

#[derive(Args)]
pub struct RotateArgs {
    /// Report what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,
    /// Key version to rotate onto (defaults to the latest loaded version).
    #[arg(long)]
    pub target_version: Option<u32>,
    /// Only rotate records that hold an envelope at this version.
    #[arg(long)]
    pub only_version: Option<u32>,
    /// Records per batch (overrides `rotation.batch_size`).
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Print the statistics as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RotateArgs {
    fn options(&self, config: &CredvaultConfig) -> RotationOptions {
        let mut options = RotationOptions::from_config(&config.rotation);
        options.dry_run = self.dry_run;
        options.target_version = self.target_version;
        options.only_version = self.only_version;
        if let Some(batch_size) = self.batch_size {
            options.batch_size = batch_size;
        }
        options
    }
}

fn registry(config: &CredvaultConfig) -> anyhow::Result<Arc<KeyRegistry>> {
    let registry = KeyRegistry::from_config(config);
    registry.initialize()?;
    Ok(Arc::new(registry))
}

pub async fn handle_rotate(config: &CredvaultConfig, args: &RotateArgs) -> anyhow::Result<ExitCode> {
    let registry = registry(config)?;
    let store = crate::open_store(config).await?;

    let stats = RotationOrchestrator::new(store, registry)
        .rotate(&args.options(config))
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", format_statistics(&stats));
    }

    Ok(if stats.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

pub async fn handle_status(config: &CredvaultConfig, json: bool) -> anyhow::Result<ExitCode> {
    let registry = registry(config)?;
    let store = crate::open_store(config).await?;

    let report = UsageReporter::new(store, registry).report().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }
    Ok(ExitCode::SUCCESS)
}

fn format_statistics(stats: &RotationStatistics) -> String {
    let mut out = String::new();
    let mode = if stats.dry_run { "dry run" } else { "live" };
    out.push_str(&format!(
        "Key rotation ({mode}) onto v{}\n",
        stats.target_version
    ));
    out.push_str(&format!("  Active records:   {}\n", stats.total_records));
    out.push_str(&format!("  Needing rotation: {}\n", stats.records_to_rotate));
    if !stats.dry_run {
        out.push_str(&format!("  Rotated:          {}\n", stats.records_rotated));
        out.push_str(&format!("  Failed:           {}\n", stats.records_failed));
    }
    out.push_str(&format!(
        "  Duration:         {} ms\n",
        stats.duration().num_milliseconds()
    ));

    if let Some(preview) = &stats.preview {
        if preview.by_version.is_empty() {
            out.push_str("\nNothing to rotate.\n");
        } else {
            out.push_str("\nWould rotate:\n");
        }
        for (version, entry) in &preview.by_version {
            out.push_str(&format!(
                "  v{version}: {} record(s): {}",
                entry.count,
                entry.sample_ids.join(", ")
            ));
            let hidden = preview.truncated(*version);
            if hidden > 0 {
                out.push_str(&format!(" (+{hidden} more)"));
            }
            out.push('\n');
        }
    }

    if stats.has_failures() {
        out.push_str("\nFailed records:\n");
        for failure in &stats.errors {
            out.push_str(&format!(
                "  {} [{}]: {}\n",
                failure.record_id,
                failure.kind.as_str(),
                failure.message
            ));
        }
    }
    out
}

fn format_report(report: &UsageReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Active records: {}\n", report.total_records));
    for (version, count) in &report.version_distribution {
        let marker = if *version == report.latest_version {
            "  (latest)"
        } else {
            ""
        };
        out.push_str(&format!("  v{version}: {count}{marker}\n"));
    }
    out.push_str(&format!(
        "Needing rotation to v{}: {}\n",
        report.latest_version, report.records_needing_rotation
    ));
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        chrono::Utc,
        credvault_rotation::{RecordFailure, RecordFailureKind, RotationPreview, VersionPreview},
        std::collections::BTreeMap,
    };

    fn stats(dry_run: bool) -> RotationStatistics {
        let now = Utc::now();
        RotationStatistics {
            total_records: 10,
            records_to_rotate: 4,
            records_rotated: if dry_run { 0 } else { 3 },
            records_failed: if dry_run { 0 } else { 1 },
            errors: if dry_run {
                Vec::new()
            } else {
                vec![RecordFailure {
                    record_id: "cred-7".into(),
                    kind: RecordFailureKind::Decryption,
                    message: "decryption failed: authentication tag mismatch".into(),
                }]
            },
            dry_run,
            target_version: 2,
            preview: dry_run.then(|| RotationPreview {
                by_version: BTreeMap::from([(1, VersionPreview {
                    count: 4,
                    sample_ids: vec!["a".into(), "b".into()],
                })]),
            }),
            started_at: now,
            completed_at: now,
        }
    }

    #[test]
    fn live_summary_lists_failures() {
        let text = format_statistics(&stats(false));
        assert!(text.contains("(live) onto v2"));
        assert!(text.contains("Rotated:          3"));
        assert!(text.contains("cred-7 [decryption]"));
    }

    #[test]
    fn dry_run_summary_shows_preview() {
        let text = format_statistics(&stats(true));
        assert!(text.contains("(dry run)"));
        assert!(text.contains("v1: 4 record(s): a, b (+2 more)"));
        assert!(!text.contains("Failed records"));
    }

    #[test]
    fn args_override_config() {
        let args = RotateArgs {
            dry_run: true,
            target_version: Some(4),
            only_version: None,
            batch_size: Some(5),
            json: false,
        };
        let options = args.options(&CredvaultConfig::default());
        assert!(options.dry_run);
        assert_eq!(options.batch_size, 5);
        assert_eq!(options.target_version, Some(4));
        assert_eq!(options.preview_limit, 10);
    }

    #[test]
    fn report_marks_latest() {
        let report = UsageReport {
            total_records: 3,
            version_distribution: BTreeMap::from([(1, 1), (2, 2)]),
            latest_version: 2,
            records_needing_rotation: 1,
            generated_at: Utc::now(),
        };
        let text = format_report(&report);
        assert!(text.contains("v2: 2  (latest)"));
        assert!(text.contains("Needing rotation to v2: 1"));
    }
}
