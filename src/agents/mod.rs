//! Launch agents and the executor that runs them.
//!
//! An [`Agent`] only supplies prompt construction, a deterministic fallback
//! document and (optionally) its own unit of work. Health probing, timeouts,
//! output validation and persistence are shared and live in [`TaskExecutor`].

mod development;
mod executor;
mod launch;
mod monitoring;
mod planning;
mod report;
mod research;

pub use development::{DevCoordinationAgent, DocumentationAgent, QaTestingAgent};
pub use executor::{DegradeReason, RunScope, TaskError, TaskExecutor, TaskOutcome, TaskRun};
pub use launch::{CommsAgent, GtmAgent, ReadinessCheckAgent};
pub use monitoring::{FeedbackLoopAgent, RetrospectiveAgent, TelemetryKpiAgent};
pub use planning::{RequirementsSynthesizerAgent, RiskComplianceAgent, TimelineResourcingAgent};
pub use report::FinalReportAgent;
pub use research::{CustomerPulseAgent, MarketIntelligenceAgent};

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::llm::{GenerateRequest, InferenceClient, LlmError};
use crate::orchestrator::PhaseTable;
use crate::store::{LaunchProfile, TaskCategory};

/// Outputs of the tasks that already ran in this run, keyed by task name.
pub type ContextMap = BTreeMap<String, String>;

/// Everything an agent may look at while building a prompt or a fallback.
#[derive(Debug, Clone, Copy)]
pub struct AgentContext<'a> {
    pub run_id: i64,
    pub launch: &'a LaunchProfile,
    pub outputs: &'a ContextMap,
}

impl<'a> AgentContext<'a> {
    pub fn output(&self, task_name: &str) -> Option<&'a str> {
        self.outputs.get(task_name).map(String::as_str)
    }

    /// A bounded excerpt of an upstream task's output for use in prompts.
    pub fn excerpt(&self, task_name: &str, max_chars: usize) -> String {
        match self.output(task_name) {
            Some(text) if !text.trim().is_empty() => truncate_chars(text.trim(), max_chars),
            _ => "Not available".to_string(),
        }
    }

    pub(crate) fn product_line(&self) -> String {
        format!(
            "{} ({}, target market: {})",
            self.launch.product_name(),
            self.launch.product_type(),
            self.launch.target_market()
        )
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Capability set every inference-backed task implements.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Task name; unique within a phase table.
    fn name(&self) -> &str;

    fn category(&self) -> TaskCategory;

    /// Human readable document title, e.g. "Market Intelligence Analysis".
    fn title(&self) -> &str;

    /// Prompt for this task. Pure function of the context.
    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String;

    /// Deterministic document produced without the inference service. Must not fail.
    fn fallback(&self, ctx: &AgentContext<'_>) -> String;

    fn system_prompt(&self) -> Option<&str> {
        None
    }

    fn temperature(&self) -> f64 {
        0.7
    }

    fn max_tokens(&self) -> u32 {
        500
    }

    /// Generate the task's document with `client`.
    async fn run_logic(
        &self,
        ctx: &AgentContext<'_>,
        client: &dyn InferenceClient,
    ) -> Result<String, LlmError> {
        let request = GenerateRequest {
            prompt: self.build_prompt(ctx),
            system: self.system_prompt().map(str::to_string),
            temperature: self.temperature(),
            max_tokens: self.max_tokens(),
        };

        let text = client.generate(&request).await?;
        if text.trim().is_empty() {
            return Err(LlmError::EmptyCompletion);
        }

        Ok(format!(
            "{} for Launch {}:\n\n{}",
            self.title(),
            ctx.run_id,
            text.trim()
        ))
    }
}

/// One entry of a pipeline: either an inference-backed agent or the
/// deterministic final report.
pub enum PipelineStep {
    Inference(Box<dyn Agent>),
    Report(FinalReportAgent),
}

impl PipelineStep {
    pub fn agent<A: Agent + 'static>(agent: A) -> Self {
        Self::Inference(Box::new(agent))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Inference(agent) => agent.name(),
            Self::Report(report) => report.name(),
        }
    }

    pub fn category(&self) -> TaskCategory {
        match self {
            Self::Inference(agent) => agent.category(),
            Self::Report(_) => TaskCategory::Consolidation,
        }
    }
}

impl std::fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inference(agent) => f.debug_tuple("Inference").field(&agent.name()).finish(),
            Self::Report(report) => f.debug_tuple("Report").field(&report.name()).finish(),
        }
    }
}

/// The fourteen launch agents followed by the final report.
pub fn standard_pipeline() -> Vec<PipelineStep> {
    vec![
        PipelineStep::agent(MarketIntelligenceAgent),
        PipelineStep::agent(CustomerPulseAgent),
        PipelineStep::agent(RequirementsSynthesizerAgent),
        PipelineStep::agent(TimelineResourcingAgent),
        PipelineStep::agent(RiskComplianceAgent),
        PipelineStep::agent(DevCoordinationAgent),
        PipelineStep::agent(QaTestingAgent),
        PipelineStep::agent(DocumentationAgent),
        PipelineStep::agent(GtmAgent),
        PipelineStep::agent(ReadinessCheckAgent),
        PipelineStep::agent(CommsAgent),
        PipelineStep::agent(TelemetryKpiAgent),
        PipelineStep::agent(FeedbackLoopAgent),
        PipelineStep::agent(RetrospectiveAgent),
        PipelineStep::Report(FinalReportAgent::new(PhaseTable::standard())),
    ]
}

/// Builder for the sectioned fallback documents.
pub(crate) struct FallbackDoc {
    out: String,
}

impl FallbackDoc {
    pub fn new(title: &str, ctx: &AgentContext<'_>) -> Self {
        let mut out = format!(
            "{} for Launch {} (Fallback Response):\n\nPRODUCT OVERVIEW:\n",
            title, ctx.run_id
        );
        out.push_str(&format!("- Product: {}\n", ctx.launch.product_name()));
        out.push_str(&format!("- Type: {}\n", ctx.launch.product_type()));
        out.push_str(&format!("- Target Market: {}\n", ctx.launch.target_market()));
        Self { out }
    }

    pub fn section(mut self, heading: &str, items: &[&str]) -> Self {
        self.out.push('\n');
        self.out.push_str(heading);
        self.out.push_str(":\n");
        for item in items {
            self.out.push_str("- ");
            self.out.push_str(item);
            self.out.push('\n');
        }
        self
    }

    /// Append a bullet to the most recent section.
    pub fn bullet(mut self, item: impl AsRef<str>) -> Self {
        self.out.push_str("- ");
        self.out.push_str(item.as_ref());
        self.out.push('\n');
        self
    }

    pub fn finish(mut self, subject: &str) -> String {
        self.out.push_str(&format!(
            "\nNote: This {} was generated using fallback logic because the inference service was unavailable.",
            subject
        ));
        self.out
    }
}
