//! Research phase: market and customer signals.

use super::{Agent, AgentContext, FallbackDoc};
use crate::store::TaskCategory;

/// Competitors, market trends and pricing.
pub struct MarketIntelligenceAgent;

impl Agent for MarketIntelligenceAgent {
    fn name(&self) -> &str {
        "market_intelligence"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Research
    }

    fn title(&self) -> &str {
        "Market Intelligence Analysis"
    }

    fn system_prompt(&self) -> Option<&str> {
        Some("You are a market intelligence analyst who turns competitive research into actionable positioning advice.")
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Market analysis for {}:\n\
             - Top 3 competitors\n\
             - Key trends\n\
             - Pricing strategy\n\
             - Main recommendation\n\n\
             Product description: {}",
            ctx.product_line(),
            ctx.launch.description.as_deref().unwrap_or("Not provided")
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        let product_type = ctx.launch.product_type();
        let market = ctx.launch.target_market();
        FallbackDoc::new(self.title(), ctx)
            .section(
                "COMPETITOR ANALYSIS",
                &[
                    "Market positioning ranges from premium to budget-focused offerings",
                    "Recent moves emphasize user experience and integrations",
                ],
            )
            .bullet(format!(
                "Key competitors in the {} space include established players and emerging startups",
                product_type
            ))
            .section(
                "MARKET TRENDS",
                &[
                    "Digital transformation continues to drive demand",
                    "Customers expect seamless, integrated experiences",
                ],
            )
            .bullet(format!("Growing demand for {} solutions in {}", product_type, market))
            .section(
                "PRICING INSIGHTS",
                &[
                    "Tiered pricing from basic to enterprise is the norm",
                    "Value-based and freemium models are gaining traction",
                ],
            )
            .section(
                "RECOMMENDATIONS",
                &[
                    "Position on a clear, differentiated value proposition",
                    "Consider a freemium entry tier for acquisition",
                    "Track competitor releases and pricing changes closely",
                ],
            )
            .finish("analysis")
    }
}

/// Customer needs, pain points and sentiment.
pub struct CustomerPulseAgent;

impl Agent for CustomerPulseAgent {
    fn name(&self) -> &str {
        "customer_pulse"
    }

    fn category(&self) -> TaskCategory {
        TaskCategory::Analysis
    }

    fn title(&self) -> &str {
        "Customer Pulse Analysis"
    }

    fn build_prompt(&self, ctx: &AgentContext<'_>) -> String {
        format!(
            "Customer insights for {}:\n\
             - Top customer needs\n\
             - Main pain points\n\
             - Sentiment towards existing solutions\n\
             - Feature priorities\n\n\
             Market context: {}",
            ctx.product_line(),
            ctx.excerpt("market_intelligence", 300)
        )
    }

    fn fallback(&self, ctx: &AgentContext<'_>) -> String {
        FallbackDoc::new(self.title(), ctx)
            .section(
                "CUSTOMER NEEDS",
                &[
                    "Reliable core workflows with minimal setup",
                    "Integrations with tools already in use",
                    "Transparent pricing",
                ],
            )
            .bullet(format!(
                "Solutions tailored to {} buyers",
                ctx.launch.target_market()
            ))
            .section(
                "PAIN POINTS",
                &[
                    "Fragmented tooling and manual hand-offs",
                    "Slow onboarding and unclear documentation",
                    "Limited visibility into outcomes",
                ],
            )
            .section(
                "SENTIMENT",
                &[
                    "Existing solutions are seen as capable but complex",
                    "Customers reward responsive support",
                ],
            )
            .section(
                "FEATURE PRIORITIES",
                &[
                    "Ease of use",
                    "Reporting and analytics",
                    "Collaboration features",
                ],
            )
            .finish("customer analysis")
    }
}
