use super::Report;
use crate::analysis::{DuplicateKind, Reachability};
use crate::plan::{Action, ActionConfidence, ActionKind, GroupStatus, TransactionGroup};
use colored::Colorize;

/// Short colored summary of a report
pub struct TerminalReporter {
    /// Actions listed per group before eliding the rest
    max_actions_per_group: usize,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            max_actions_per_group: 8,
        }
    }

    pub fn with_max_actions_per_group(mut self, max: usize) -> Self {
        self.max_actions_per_group = max;
        self
    }

    pub fn report(&self, report: &Report) {
        print!("{}", self.render(report));
    }

    /// The summary as text, colored when the terminal supports it
    pub fn render(&self, report: &Report) -> String {
        let mut out = String::new();
        let run = &report.run;

        out.push('\n');
        let mode = if run.dry_run { "dry run" } else { "apply" };
        out.push_str(&format!(
            "{} {} ({})\n",
            "reclaim".cyan().bold(),
            run.root.display(),
            mode
        ));
        if let Some(error) = &run.error {
            out.push_str(&format!("{} {}\n", "Incomplete:".red().bold(), error));
        }

        let files = &report.files;
        out.push_str(&format!(
            "Files: {} scanned, {} opaque, {} skipped\n",
            files.scanned, files.opaque, files.skipped
        ));

        let exact = report
            .duplicate_clusters
            .iter()
            .filter(|c| c.kind == DuplicateKind::Exact)
            .count();
        out.push_str(&format!(
            "Duplicates: {} exact, {} near cluster(s)\n",
            exact,
            report.duplicate_clusters.len() - exact
        ));

        let certain = report
            .removal_candidates
            .iter()
            .filter(|c| c.reachability == Reachability::UnreachableCertain)
            .count();
        out.push_str(&format!(
            "Unreachable: {} certain, {} heuristic\n",
            certain,
            report.removal_candidates.len() - certain
        ));

        if report.actions.is_empty() {
            out.push('\n');
            out.push_str(&format!("{}\n", "Nothing to clean up.".green().bold()));
            self.push_prior(&mut out, report);
            return out;
        }

        out.push('\n');
        out.push_str(&format!(
            "{}\n",
            format!(
                "Plan: {} action(s) in {} group(s)",
                report.actions.len(),
                report.groups.len()
            )
            .yellow()
            .bold()
        ));
        for group in &report.groups {
            self.push_group(&mut out, report, group);
        }

        out.push_str(&format!("{}\n", "─".repeat(60).dimmed()));
        let mut parts = Vec::new();
        for status in [
            GroupStatus::Pending,
            GroupStatus::Manual,
            GroupStatus::NeedsRevision,
            GroupStatus::Committed,
            GroupStatus::RolledBack,
            GroupStatus::Declined,
        ] {
            let count = report.groups.iter().filter(|g| g.status == status).count();
            if count > 0 {
                parts.push(format!("{} {}", count, status_label(status)));
            }
        }
        out.push_str(&format!("Groups: {}\n", parts.join(", ")));
        self.push_prior(&mut out, report);

        if run.dry_run && report.groups.iter().any(|g| g.status == GroupStatus::Pending) {
            out.push_str(&format!(
                "{}\n",
                "Tip: Run with --apply --verify-command <CMD> to apply pending groups".dimmed()
            ));
        }
        out
    }

    fn push_group(&self, out: &mut String, report: &Report, group: &TransactionGroup) {
        out.push_str(&format!(
            "  {} {}\n",
            format!("group {}", group.id).bold(),
            status_badge(group.status)
        ));
        for id in group.actions.iter().take(self.max_actions_per_group) {
            if let Some(action) = report.actions.get(*id) {
                out.push_str(&format!("    {} {}\n", kind_badge(action), action_text(action)));
            }
        }
        if group.actions.len() > self.max_actions_per_group {
            out.push_str(&format!(
                "    {}\n",
                format!("... and {} more", group.actions.len() - self.max_actions_per_group).dimmed()
            ));
        }
        if let Some(note) = &group.note {
            out.push_str(&format!("    {} {}\n", "→".dimmed(), note.dimmed()));
        }
    }

    fn push_prior(&self, out: &mut String, report: &Report) {
        match report.run.unchanged_since_prior {
            Some(true) => out.push_str(&format!("{}\n", "Unchanged since the prior report.".green())),
            Some(false) => out.push_str(&format!("{}\n", "Plan changed since the prior report.".yellow())),
            None => {}
        }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn status_label(status: GroupStatus) -> &'static str {
    match status {
        GroupStatus::Pending => "pending",
        GroupStatus::Manual => "manual",
        GroupStatus::NeedsRevision => "needs-revision",
        GroupStatus::Committed => "committed",
        GroupStatus::RolledBack => "rolled-back",
        GroupStatus::Declined => "declined",
    }
}

fn status_badge(status: GroupStatus) -> colored::ColoredString {
    let label = format!("[{}]", status_label(status));
    match status {
        GroupStatus::Pending => label.cyan(),
        GroupStatus::Manual => label.blue(),
        GroupStatus::NeedsRevision => label.red().bold(),
        GroupStatus::Committed => label.green().bold(),
        GroupStatus::RolledBack => label.yellow().bold(),
        GroupStatus::Declined => label.dimmed(),
    }
}

fn kind_badge(action: &Action) -> colored::ColoredString {
    let label = action.kind.as_str();
    match (action.kind, action.confidence) {
        (ActionKind::Remove | ActionKind::Archive, _) => label.red(),
        (ActionKind::Merge, ActionConfidence::Certain) => label.green(),
        (ActionKind::Merge, ActionConfidence::Heuristic) => label.bright_green(),
        (ActionKind::Parameterize, _) => label.magenta(),
        (ActionKind::FlagForReview, _) => label.yellow(),
    }
}

fn action_text(action: &Action) -> String {
    match &action.canonical {
        Some(canonical) => format!("{} {} {}", action.subject, "→".dimmed(), canonical),
        None => action.subject.to_string(),
    }
}
