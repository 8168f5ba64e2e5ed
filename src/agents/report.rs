//! The consolidated launch report.
//!
//! Unlike the other steps this one never calls the inference service. It reads
//! every recorded task result plus the live context and renders a fixed
//! document, so it can only fail on aggregation.

use std::fmt::Write;

use super::executor::TaskError;
use super::{truncate_chars, AgentContext};
use crate::orchestrator::PhaseTable;
use crate::store::{Status, TaskResult};

const TASK_NAME: &str = "final_report";
const RULE: &str = "============================================================";

/// Renders the final consolidated report from the outputs of every other task.
#[derive(Debug, Clone)]
pub struct FinalReportAgent {
    phases: PhaseTable,
}

impl FinalReportAgent {
    /// `phases` decides how task outputs are grouped in the report.
    pub fn new(phases: PhaseTable) -> Self {
        Self { phases }
    }

    pub fn name(&self) -> &str {
        TASK_NAME
    }

    pub fn compile(
        &self,
        ctx: &AgentContext<'_>,
        results: &[TaskResult],
        excerpt_chars: usize,
    ) -> Result<String, TaskError> {
        let mut out = String::new();
        let contributors: Vec<&str> = self
            .phases
            .task_names()
            .filter(|name| *name != TASK_NAME)
            .collect();

        let contributed = contributors
            .iter()
            .filter(|name| task_text(ctx, results, name).is_some())
            .count();
        let failed = results
            .iter()
            .filter(|r| r.task_name != TASK_NAME && (r.error_flag || r.status == Status::Failed))
            .count();

        writeln!(out, "FINAL CONSOLIDATED REPORT FOR LAUNCH {}", ctx.run_id)?;
        writeln!(out, "{}", RULE)?;

        writeln!(out, "\nEXECUTIVE SUMMARY:")?;
        writeln!(out, "- Product: {}", ctx.launch.product_name())?;
        writeln!(out, "- Type: {}", ctx.launch.product_type())?;
        writeln!(out, "- Target Market: {}", ctx.launch.target_market())?;
        if let Some(description) = ctx.launch.description.as_deref() {
            writeln!(out, "- Description: {}", description)?;
        }
        writeln!(
            out,
            "- {} of {} tasks contributed output; {} failed",
            contributed,
            contributors.len(),
            failed
        )?;

        for phase in self.phases.phases() {
            let tasks: Vec<&String> = phase.tasks.iter().filter(|t| *t != TASK_NAME).collect();
            if tasks.is_empty() {
                continue;
            }

            writeln!(out, "\n{} PHASE:", phase_heading(&phase.name))?;
            for task in tasks {
                match task_text(ctx, results, task) {
                    Some(text) => {
                        writeln!(out, "\n[{}]", display_name(task))?;
                        writeln!(out, "{}", truncate_chars(text.trim(), excerpt_chars))?;
                    }
                    None => writeln!(out, "\n[{}]\nNo output recorded.", display_name(task))?,
                }
            }
        }

        writeln!(out, "\nKEY RECOMMENDATIONS:")?;
        writeln!(
            out,
            "- Launch {} to {} with the positioning agreed in the go-to-market plan",
            ctx.launch.product_name(),
            ctx.launch.target_market()
        )?;
        writeln!(out, "- Resolve open risks before the readiness review")?;
        writeln!(out, "- Keep the feedback loop running through the first quarter")?;

        writeln!(out, "\nSUCCESS METRICS:")?;
        writeln!(out, "- Activation and weekly active usage against target")?;
        writeln!(out, "- Customer satisfaction and support volume")?;
        writeln!(out, "- Revenue against forecast")?;

        writeln!(out, "\nNEXT STEPS:")?;
        writeln!(out, "1. Review this report with stakeholders")?;
        writeln!(out, "2. Confirm owners for each recommendation")?;
        writeln!(out, "3. Schedule the post-launch review")?;

        write!(
            out,
            "\nCONCLUSION:\nThis report consolidates {} task outputs for launch {}.",
            contributed, ctx.run_id
        )?;

        Ok(out)
    }
}

/// Live context first, the stored output second.
fn task_text<'a>(ctx: &AgentContext<'a>, results: &'a [TaskResult], task: &str) -> Option<&'a str> {
    ctx.output(task)
        .filter(|text| !text.trim().is_empty())
        .or_else(|| {
            results
                .iter()
                .find(|r| r.task_name == task)
                .and_then(|r| r.output.as_deref())
                .filter(|text| !text.trim().is_empty())
        })
}

fn phase_heading(name: &str) -> String {
    name.replace('_', " ").to_uppercase()
}

fn display_name(task: &str) -> String {
    task.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
