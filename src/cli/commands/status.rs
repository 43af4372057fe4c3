//! Status Command
//!
//! Display committed state, the last run and pending work for a project.

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, project_name};
use crate::config::ConfigLoader;
use crate::feedback::FeedbackQueue;
use crate::pipeline::RunReport;
use crate::storage::{PublishJournal, RootLock, RunHistory, StateStore};
use crate::types::Result;

pub fn run(project_root: &Path, json_output: bool) -> Result<()> {
    if !ConfigLoader::is_project_initialized(project_root) {
        if json_output {
            println!("{{\"status\": \"not_initialized\"}}");
        } else {
            println!("wikisync Status");
            println!("══════════════════════════════════════");
            println!("Not initialized. Run 'wikisync init' first.");
        }
        // Informational command, not an error
        return Ok(());
    }

    let ctx = CommandContext::load(project_root)?;
    let db = ctx.open_db()?;
    let root = ctx.root().to_string();

    let state = StateStore::new(db.clone()).load(&root)?;
    let archived = state.records.values().filter(|r| r.is_archived()).count();
    let manual_edits = state.records.values().filter(|r| r.manual_edit_flag).count();
    let journaled = PublishJournal::new(db.clone(), root.as_str()).entries()?.len();
    let pending_feedback = FeedbackQueue::new(db.clone()).pending()?.len();
    let last_run: Option<RunReport> = RunHistory::new(db).latest(&root)?;
    let lock = RootLock::holder(&ConfigLoader::project_dir(project_root), &root)
        .filter(|_| RootLock::is_held(&ConfigLoader::project_dir(project_root), &root));

    if json_output {
        let status = serde_json::json!({
            "status": "initialized",
            "project": project_name(project_root, &ctx.config),
            "root": root,
            "platform": ctx.config.platform.kind,
            "state": {
                "version": state.version,
                "entities": state.fingerprints.len(),
                "pages": state.records.len(),
                "archived": archived,
                "manual_edits": manual_edits,
            },
            "journal_entries": journaled,
            "pending_feedback": pending_feedback,
            "locked_by": lock.map(|l| l.pid),
            "last_run": last_run,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let out = Output::new();
    println!("wikisync Status");
    println!("══════════════════════════════════════");
    out.field("Project", project_name(project_root, &ctx.config));
    out.field("Root", &root);
    out.field("Platform", format!("{:?}", ctx.config.platform.kind).to_lowercase());

    out.section("Committed state");
    out.field("Version", state.version);
    out.field("Entities", state.fingerprints.len());
    out.field(
        "Pages",
        format!("{} ({} archived, {} edited remotely)", state.records.len(), archived, manual_edits),
    );

    if let Some(report) = &last_run {
        out.section("Last sync");
        if let Some(finished) = report.finished_at {
            out.field("Finished", finished.format("%Y-%m-%d %H:%M UTC"));
        }
        out.field(
            "Published",
            format!(
                "{} applied, {} failed, {} conflicts",
                report.publish.applied,
                report.publish_failures.len(),
                report.conflicts.len()
            ),
        );
    }

    if journaled > 0 {
        out.warning(&format!(
            "{} operation(s) from an interrupted sync will be recovered on the next run",
            journaled
        ));
    }
    if pending_feedback > 0 {
        out.info(&format!("{} feedback item(s) pending", pending_feedback));
    }
    if let Some(lock) = lock {
        out.warning(&format!("Sync in progress (pid {}, since {})", lock.pid, lock.acquired_at));
    }

    Ok(())
}
