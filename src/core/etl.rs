use crate::domain::model::RunSummary;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub outputs: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&mut self) -> Result<RunReport> {
        let started_at = Utc::now();
        tracing::info!("🗺️  Starting geocoding run at {}", started_at.to_rfc3339());

        // Extract
        let dataset = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", dataset.len());

        // Transform
        let result = self.pipeline.transform(dataset).await?;
        tracing::info!(
            "Geocoded {} records ({} requests issued)",
            result.summary.total,
            result.summary.requests_issued
        );

        // Load
        let outputs = self.pipeline.load(&result).await?;
        let finished_at = Utc::now();
        tracing::info!(
            "Run finished in {}s",
            (finished_at - started_at).num_seconds()
        );

        Ok(RunReport {
            summary: result.summary,
            outputs,
            started_at,
            finished_at,
        })
    }
}

/// Final tally as printable lines.
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![
        "=".repeat(70),
        "📊 GEOCODING SUMMARY".to_string(),
        "=".repeat(70),
        format!("Total services:        {}", summary.total),
        format!("Successfully geocoded: {}", summary.resolved),
        format!("No match (failed):     {}", summary.failed),
        format!("Errors:                {}", summary.error),
        format!("Skipped (checkpoint):  {}", summary.skipped),
        format!("Manually fixed:        {}", summary.manually_fixed),
        format!("Success rate:          {}", summary.success_rate_display()),
    ];

    if !summary.by_group.is_empty() {
        lines.push(String::new());
        lines.push("📍 Results by group:".to_string());
        for (group, stats) in &summary.by_group {
            let rate = if stats.total > 0 {
                stats.resolved as f64 / stats.total as f64 * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "   {:20} {:3}/{:3} geocoded ({:.0}%)",
                group, stats.resolved, stats.total, rate
            ));
        }
    }

    if !summary.unresolved.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "⚠️  {} addresses need manual review:",
            summary.unresolved.len()
        ));
        for row in &summary.unresolved {
            let status = row.accuracy.map(|a| a.to_string()).unwrap_or_default();
            match &row.group {
                Some(group) => lines.push(format!("   - [{}] {} ({})", group, row.name, status)),
                None => lines.push(format!("   - {} ({})", row.name, status)),
            }
            lines.push(format!("     Address: {}", row.address));
        }
    }

    lines
}
