//! Monitoring phase: KPIs, feedback and the retrospective.

use super::{Agent, AgentContext, FallbackDoc};
use crate::store::TaskCategory;

pub struct TelemetryKpiAgent;

impl Agent for TelemetryKpiAgent {
    fn name(&self) -> &str {
        "telemetry_kpi"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Monitoring
    }

    fn title(&self) -> &str {
        "Telemetry and KPI Framework"
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "KPI and telemetry framework for {}:\n\n\
             Requirements: {}\n\n\
             Define adoption, engagement, quality and revenue KPIs with targets and dashboards.",
            ctx.product_line(),
            ctx.excerpt("requirements_synthesizer", 300)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "ADOPTION",
                &["New sign-ups per week", "Activation within seven days"],
            )
            .section(
                "ENGAGEMENT",
                &["Weekly active users", "Feature usage breadth"],
            )
            .section("QUALITY", &["Error rate", "p95 latency", "Support tickets per account"])
            .finish("framework")
    }
}

pub struct FeedbackLoopAgent;

impl Agent for FeedbackLoopAgent {
    fn name(&self) -> &str {
        "feedback_loop"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Monitoring
    }

    fn title(&self) -> &str {
        "Feedback Loop Analysis"
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Post-launch feedback loop for {}:\n\n\
             Customer insights: {}\n\
             KPIs: {}\n\n\
             Describe collection channels, triage and how feedback reaches the roadmap.",
            ctx.product_line(),
            ctx.excerpt("customer_pulse", 200),
            ctx.excerpt("telemetry_kpi", 200)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "CHANNELS",
                &["In-app surveys", "Support tickets", "Customer interviews"],
            )
            .section(
                "PROCESS",
                &[
                    "Weekly triage of incoming feedback",
                    "Themes reviewed in roadmap planning",
                    "Close the loop with customers on shipped fixes",
                ],
            )
            .finish("analysis")
    }
}

pub struct RetrospectiveAgent;

impl Agent for RetrospectiveAgent {
    fn name(&self) -> &str {
        "retrospective"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Analysis
    }

    fn title(&self) -> &str {
        "Launch Retrospective"
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Launch retrospective for {}:\n\n\
             Readiness: {}\n\
             Feedback: {}\n\n\
             Summarize what went well, what did not and the lessons for the next launch.",
            ctx.product_line(),
            ctx.excerpt("readiness_check", 200),
            ctx.excerpt("feedback_loop", 200)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "WHAT WENT WELL",
                &["Cross-functional coordination", "Clear milestone tracking"],
            )
            .section(
                "WHAT TO IMPROVE",
                &["Earlier customer validation", "Tighter scope control"],
            )
            .section(
                "LESSONS",
                &["Start readiness reviews two weeks before launch"],
            )
            .finish("retrospective")
    }
}
