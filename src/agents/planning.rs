//! Planning phase: requirements, timeline and risk.

use super::{Agent, AgentContext, FallbackDoc};
use crate::store::TaskCategory;

/// Drafts the product requirements document from research output.
pub struct RequirementsSynthesizerAgent;

impl Agent for RequirementsSynthesizerAgent {
    fn name(&self) -> &str {
        "requirements_synthesizer"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Analysis
    }

    fn title(&self) -> &str {
        "Product Requirements Document"
    }

    fn system_prompt(&self) -> Option<&str> {
        Some("You are a senior product manager who writes concise, actionable requirements.")
    }

    fn max_tokens(&self) -> u32 {
        600
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Product requirements for {}:\n\n\
             Market insights: {}\n\n\
             Customer insights: {}\n\n\
             List the core features, user personas, non-functional requirements and success metrics.",
            ctx.product_line(),
            ctx.excerpt("market_intelligence", 200),
            ctx.excerpt("customer_pulse", 200)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section("EXECUTIVE SUMMARY", &[])
            .bullet(format!(
                "{} addresses the core needs of {} customers",
                ctx.launch.product_name(),
                ctx.launch.target_market()
            ))
            .section(
                "FUNCTIONAL REQUIREMENTS",
                &[
                    "User authentication and role-based access",
                    "Core workflow management",
                    "Reporting dashboard",
                    "Integration API",
                ],
            )
            .section(
                "NON-FUNCTIONAL REQUIREMENTS",
                &[
                    "p95 page load under 2 seconds",
                    "99.9% availability",
                    "Encryption in transit and at rest",
                ],
            )
            .section(
                "SUCCESS METRICS",
                &[
                    "Activation rate of new accounts",
                    "Weekly active usage",
                    "Net promoter score",
                ],
            )
            .finish("requirements document")
    }
}

/// Milestones, staffing and resource allocation.
pub struct TimelineResourcingAgent;

impl Agent for TimelineResourcingAgent {
    fn name(&self) -> &str {
        "timeline_resourcing"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Coordination
    }

    fn title(&self) -> &str {
        "Timeline and Resource Plan"
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Timeline and resourcing plan for {}:\n\n\
             Requirements: {}\n\n\
             Provide milestones, team composition and the critical path.",
            ctx.product_line(),
            ctx.excerpt("requirements_synthesizer", 300)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "MILESTONES",
                &[
                    "Weeks 1-2: discovery and design",
                    "Weeks 3-8: core development",
                    "Weeks 9-10: testing and hardening",
                    "Weeks 11-12: launch preparation",
                ],
            )
            .section(
                "TEAM",
                &[
                    "Product manager",
                    "Engineering lead with three to five engineers",
                    "Designer",
                    "QA engineer",
                ],
            )
            .section(
                "CRITICAL PATH",
                &[
                    "Requirements sign-off",
                    "Core feature completion",
                    "Release candidate approval",
                ],
            )
            .finish("plan")
    }
}

/// Regulatory, security and delivery risks.
pub struct RiskComplianceAgent;

impl Agent for RiskComplianceAgent {
    fn name(&self) -> &str {
        "risk_compliance"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Analysis
    }

    fn title(&self) -> &str {
        "Risk and Compliance Assessment"
    }

    fn temperature(&self) -> f64 {
        0.4
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Risk and compliance assessment for {}:\n\n\
             Requirements: {}\n\
             Timeline: {}\n\n\
             Identify regulatory, security, technical and schedule risks with mitigations.",
            ctx.product_line(),
            ctx.excerpt("requirements_synthesizer", 200),
            ctx.excerpt("timeline_resourcing", 200)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "REGULATORY",
                &[
                    "Review data protection obligations (GDPR, CCPA)",
                    "Confirm accessibility requirements",
                ],
            )
            .bullet(format!(
                "Check sector rules that apply in {}",
                ctx.launch.target_market()
            ))
            .section(
                "SECURITY",
                &[
                    "Threat model the authentication flow",
                    "Schedule a third-party penetration test",
                ],
            )
            .section(
                "DELIVERY",
                &[
                    "Scope creep: freeze requirements before development",
                    "Key-person dependency: document critical knowledge",
                ],
            )
            .finish("assessment")
    }
}
