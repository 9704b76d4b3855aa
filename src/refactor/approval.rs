use crate::plan::CleanupPlan;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use tracing::warn;

/// Decides whether a pending group may be applied
pub trait Approver {
    fn approve(&mut self, plan: &CleanupPlan, group: usize) -> bool;
}

/// Approves every group
pub struct ApproveAll;

impl Approver for ApproveAll {
    fn approve(&mut self, _plan: &CleanupPlan, _group: usize) -> bool {
        true
    }
}

/// Interactive mode - confirm each group on the terminal
pub struct PromptApprover {
    theme: ColorfulTheme,
}

impl PromptApprover {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for PromptApprover {
    fn default() -> Self {
        Self::new()
    }
}

impl Approver for PromptApprover {
    fn approve(&mut self, plan: &CleanupPlan, group: usize) -> bool {
        let actions = plan.actions_in(group);
        println!();
        println!(
            "{}",
            format!("Group {} ({} action(s)):", group, actions.len()).cyan().bold()
        );
        for action in &actions {
            println!("  {} {}", "-".dimmed(), action.describe());
        }

        match Confirm::with_theme(&self.theme)
            .with_prompt(format!("Apply group {}?", group))
            .default(false)
            .interact()
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Prompt failed, skipping group {}: {}", group, e);
                false
            }
        }
    }
}
