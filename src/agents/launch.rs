//! Launch phase: go-to-market, readiness and communications.

use super::{Agent, AgentContext, FallbackDoc};
use crate::store::TaskCategory;

pub struct GtmAgent;

impl Agent for GtmAgent {
    fn name(&self) -> &str {
        "gtm"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Coordination
    }

    fn title(&self) -> &str {
        "Go-to-Market Strategy"
    }

    fn system_prompt(&self) -> Option<&str> {
        Some("You are a go-to-market strategist for technology products.")
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Go-to-market strategy for {}:\n\n\
             Market insights: {}\n\
             Customer insights: {}\n\n\
             Cover positioning, channels, pricing and launch sequencing.",
            ctx.product_line(),
            ctx.excerpt("market_intelligence", 200),
            ctx.excerpt("customer_pulse", 200)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section("POSITIONING", &[])
            .bullet(format!(
                "{} as the simplest way for {} teams to get results",
                ctx.launch.product_name(),
                ctx.launch.target_market()
            ))
            .section(
                "CHANNELS",
                &[
                    "Content marketing and SEO",
                    "Partner integrations marketplace",
                    "Direct sales for larger accounts",
                ],
            )
            .section(
                "LAUNCH SEQUENCE",
                &[
                    "Private beta with design partners",
                    "Public announcement",
                    "Post-launch campaign",
                ],
            )
            .finish("strategy")
    }
}

pub struct ReadinessCheckAgent;

impl Agent for ReadinessCheckAgent {
    fn name(&self) -> &str {
        "readiness_check"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Monitoring
    }

    fn title(&self) -> &str {
        "Launch Readiness Assessment"
    }

    fn temperature(&self) -> f64 {
        0.3
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Launch readiness check for {}:\n\n\
             QA status: {}\n\
             Documentation: {}\n\
             Go-to-market: {}\n\n\
             Give a go/no-go assessment with any blocking items.",
            ctx.product_line(),
            ctx.excerpt("qa_testing", 150),
            ctx.excerpt("documentation", 150),
            ctx.excerpt("gtm", 150)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "CHECKLIST",
                &[
                    "Release candidate passed QA sign-off",
                    "Documentation published",
                    "Support team trained",
                    "Monitoring and alerting in place",
                    "Rollback plan rehearsed",
                ],
            )
            .section(
                "ASSESSMENT",
                &["Proceed once every checklist item is confirmed by its owner"],
            )
            .finish("assessment")
    }
}

pub struct CommsAgent;

impl Agent for CommsAgent {
    fn name(&self) -> &str {
        "comms"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Coordination
    }

    fn title(&self) -> &str {
        "Communications Plan"
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Launch communications plan for {}:\n\n\
             Go-to-market: {}\n\n\
             Cover internal announcements, customer messaging, press and social channels.",
            ctx.product_line(),
            ctx.excerpt("gtm", 300)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "INTERNAL",
                &[
                    "All-hands briefing before launch",
                    "Sales and support enablement notes",
                ],
            )
            .section("EXTERNAL", &["Blog post and press release", "Social media campaign"])
            .bullet(format!(
                "Email announcement to {} prospects",
                ctx.launch.target_market()
            ))
            .finish("plan")
    }
}
