use console::style;

use crate::pipeline::RunReport;
use crate::reconcile::{MutationPlan, OperationKind};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        println!("  {:<14} {}", format!("{}:", label), value);
    }

    /// One line per planned operation, skips folded into a count
    pub fn plan(&self, plan: &MutationPlan) {
        self.section(&format!("Plan {}", &plan.plan_id[..12.min(plan.plan_id.len())]));
        let mut skipped = 0;
        for op in &plan.operations {
            let marker = match op.kind {
                OperationKind::Create => style("+").green(),
                OperationKind::Update => style("~").yellow(),
                OperationKind::OrphanArchive => style("-").red(),
                OperationKind::Conflict => style("!").red().bold(),
                OperationKind::Skip => {
                    skipped += 1;
                    continue;
                }
            };
            let edited = if op.manual_edit { " (edited remotely)" } else { "" };
            println!("  {} {:<40} {}{}", marker, op.page_key, style(op.reason).dim(), edited);
        }
        if skipped > 0 {
            println!("  {} unchanged or deferred", style(skipped).dim());
        }
    }

    /// Stage counts, then every failure and conflict by page
    pub fn report(&self, report: &RunReport) {
        self.section("Analysis");
        self.field("Files", report.files_scanned);
        self.field("Entities", report.entities);
        self.field(
            "Changes",
            format!(
                "{} changed, {} removed, {} to regenerate",
                report.changes.changed, report.changes.removed, report.changes.regenerate
            ),
        );
        if !report.analysis_failures.is_empty() {
            self.field("Unanalyzed", report.analysis_failures.len());
        }
        if !report.schema_violations.is_empty() {
            self.field("Rejected", report.schema_violations.len());
        }

        self.section("Content");
        self.field(
            "Groups",
            format!(
                "{} ({} generated, {} cached, {} failed)",
                report.synthesis.groups,
                report.synthesis.generated,
                report.synthesis.cached,
                report.synthesis.failed
            ),
        );
        self.field(
            "Pages",
            format!("{} ({} deferred)", report.pages, report.deferred_pages),
        );

        self.section("Plan");
        self.field(
            "Operations",
            format!(
                "{} create, {} update, {} archive, {} skip, {} conflict",
                report.plan.create,
                report.plan.update,
                report.plan.orphan_archive,
                report.plan.skip,
                report.plan.conflict
            ),
        );
        if report.recovered_operations > 0 {
            self.field("Recovered", report.recovered_operations);
        }

        if !report.plan_only {
            self.section("Publish");
            self.field(
                "Operations",
                format!(
                    "{} applied, {} resumed, {} failed",
                    report.publish.applied, report.publish.resumed, report.publish.failed
                ),
            );
            if let Some(version) = report.state_version {
                self.field("State", format!("version {}", version));
            }
        }

        for failure in &report.generation_failures {
            self.error(&format!(
                "{}: generation failed after {} attempt(s): {}",
                failure.page_key, failure.attempts, failure.reason
            ));
        }
        for failure in &report.publish_failures {
            self.error(&format!(
                "{}: {} failed: {}",
                failure.page_key,
                failure.kind,
                failure.error.as_deref().unwrap_or("unknown error")
            ));
        }
        for conflict in &report.conflicts {
            self.warning(&format!("{}: conflict ({})", conflict.page_key, conflict.reason));
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
