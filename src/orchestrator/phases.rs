//! Static phase/task topology.

use std::collections::HashSet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("phase {0} has no tasks")]
    EmptyPhase(String),

    #[error("task {0} is declared more than once")]
    DuplicateTask(String),
}

/// An ordered group of task names executed as one sequential block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    pub tasks: Vec<String>,
}

impl Phase {
    pub fn new(name: &str, tasks: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Ordered phases; task order across the table is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTable {
    phases: Vec<Phase>,
}

impl PhaseTable {
    /// Build a table, rejecting empty phases and task names declared twice.
    pub fn new(phases: Vec<Phase>) -> Result<Self, PhaseError> {
        let mut seen = HashSet::new();
        for phase in &phases {
            if phase.tasks.is_empty() {
                return Err(PhaseError::EmptyPhase(phase.name.clone()));
            }
            for task in &phase.tasks {
                if !seen.insert(task.as_str()) {
                    return Err(PhaseError::DuplicateTask(task.clone()));
                }
            }
        }
        Ok(Self { phases })
    }

    /// research → planning → development → launch → monitoring → final_report.
    pub fn standard() -> Self {
        Self {
            phases: vec![
                Phase::new("research", &["market_intelligence", "customer_pulse"]),
                Phase::new(
                    "planning",
                    &[
                        "requirements_synthesizer",
                        "timeline_resourcing",
                        "risk_compliance",
                    ],
                ),
                Phase::new(
                    "development",
                    &["dev_coordination", "qa_testing", "documentation"],
                ),
                Phase::new("launch", &["gtm", "readiness_check", "comms"]),
                Phase::new(
                    "monitoring",
                    &["telemetry_kpi", "feedback_loop", "retrospective"],
                ),
                Phase::new("final_report", &["final_report"]),
            ],
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Every task name in execution order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.phases
            .iter()
            .flat_map(|p| p.tasks.iter().map(String::as_str))
    }

    pub fn task_count(&self) -> usize {
        self.phases.iter().map(|p| p.tasks.len()).sum()
    }
}
