//! Development phase: engineering coordination, QA and docs.

use super::{Agent, AgentContext, FallbackDoc};
use crate::store::TaskCategory;

pub struct DevCoordinationAgent;

impl Agent for DevCoordinationAgent {
    fn name(&self) -> &str {
        "dev_coordination"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Coordination
    }

    fn title(&self) -> &str {
        "Development Coordination Plan"
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Development coordination for {}:\n\n\
             Requirements: {}\n\
             Timeline: {}\n\n\
             Describe sprint structure, dependencies between workstreams and status tracking.",
            ctx.product_line(),
            ctx.excerpt("requirements_synthesizer", 200),
            ctx.excerpt("timeline_resourcing", 200)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "SPRINT STRUCTURE",
                &[
                    "Two-week sprints with planning and review",
                    "Daily stand-ups across workstreams",
                ],
            )
            .section(
                "DEPENDENCIES",
                &[
                    "Backend API before frontend integration",
                    "Design system before UI build-out",
                ],
            )
            .section(
                "TRACKING",
                &[
                    "Burndown per sprint",
                    "Blocked items reviewed daily",
                ],
            )
            .finish("plan")
    }
}

pub struct QaTestingAgent;

impl Agent for QaTestingAgent {
    fn name(&self) -> &str {
        "qa_testing"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Coordination
    }

    fn title(&self) -> &str {
        "QA and Testing Strategy"
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "QA and testing strategy for {}:\n\n\
             Requirements: {}\n\
             Development plan: {}\n\n\
             Cover test levels, automation, performance testing and release criteria.",
            ctx.product_line(),
            ctx.excerpt("requirements_synthesizer", 200),
            ctx.excerpt("dev_coordination", 200)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "TEST LEVELS",
                &[
                    "Unit tests on every change",
                    "Integration tests for external interfaces",
                    "End-to-end tests for the primary user journeys",
                ],
            )
            .section(
                "AUTOMATION",
                &[
                    "CI runs the full suite on every merge",
                    "Nightly performance regression run",
                ],
            )
            .section(
                "RELEASE CRITERIA",
                &[
                    "No open critical or high severity defects",
                    "Performance targets met",
                ],
            )
            .finish("strategy")
    }
}

pub struct DocumentationAgent;

impl Agent for DocumentationAgent {
    fn name(&self) -> &str {
        "documentation"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Coordination
    }

    fn title(&self) -> &str {
        "Documentation Plan"
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Documentation plan for {}:\n\n\
             Requirements: {}\n\n\
             List user guides, API references, release notes and internal runbooks to produce.",
            ctx.product_line(),
            ctx.excerpt("requirements_synthesizer", 300)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "USER DOCUMENTATION",
                &[
                    "Getting started guide",
                    "Feature how-to articles",
                    "FAQ",
                ],
            )
            .section(
                "TECHNICAL DOCUMENTATION",
                &[
                    "API reference",
                    "Integration guides",
                ],
            )
            .section(
                "INTERNAL",
                &[
                    "Support runbooks",
                    "Release notes template",
                ],
            )
            .finish("plan")
    }
}
