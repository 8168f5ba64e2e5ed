//! Records persisted by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a launch run or of a single task result.
///
/// Task results only move forward along `pending → in_progress → {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether a task result may move from `self` to `next`.
    ///
    /// Staying put is allowed; moving backwards or between the two terminal
    /// states is not.
    pub fn can_advance_to(&self, next: Status) -> bool {
        *self == next || next.rank() > self.rank()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown status `{}`", other)),
        }
    }
}

/// Broad kind of work an agent performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Research,
    Analysis,
    Coordination,
    Monitoring,
    Consolidation,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Analysis => "analysis",
            Self::Coordination => "coordination",
            Self::Monitoring => "monitoring",
            Self::Consolidation => "consolidation",
        }
    }
}

impl std::str::FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "research" => Ok(Self::Research),
            "analysis" => Ok(Self::Analysis),
            "coordination" => Ok(Self::Coordination),
            "monitoring" => Ok(Self::Monitoring),
            "consolidation" => Ok(Self::Consolidation),
            other => Err(format!("unknown task category `{}`", other)),
        }
    }
}

/// A tracked product launch; one run of the pipeline executes against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Launch {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub product_type: Option<String>,
    pub target_market: Option<String>,
    pub status: Status,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Launch {
    pub fn profile(&self) -> LaunchProfile {
        LaunchProfile {
            name: self.name.clone(),
            description: self.description.clone(),
            product_type: self.product_type.clone(),
            target_market: self.target_market.clone(),
            created_at: Some(self.created_at),
        }
    }
}

/// Input for creating a launch.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLaunch {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub target_market: Option<String>,
}

/// The parts of a launch agents are allowed to see.
#[derive(Debug, Clone, Default)]
pub struct LaunchProfile {
    pub name: String,
    pub description: Option<String>,
    pub product_type: Option<String>,
    pub target_market: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl LaunchProfile {
    pub fn product_name(&self) -> &str {
        if self.name.is_empty() {
            "Unknown Product"
        } else {
            &self.name
        }
    }

    pub fn product_type(&self) -> &str {
        self.product_type.as_deref().unwrap_or("Unknown")
    }

    pub fn target_market(&self) -> &str {
        self.target_market.as_deref().unwrap_or("Unknown")
    }
}

/// One row per (launch, task name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: i64,
    pub launch_id: i64,
    pub task_name: String,
    pub category: TaskCategory,
    pub output: Option<String>,
    pub status: Status,
    pub error_flag: bool,
    pub error_message: Option<String>,
    pub duration_seconds: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Partial update of a task result; only `Some` fields change.
#[derive(Debug, Clone, Default)]
pub struct ResultUpdate {
    pub output: Option<String>,
    pub status: Option<Status>,
    pub error_flag: Option<bool>,
    pub error_message: Option<String>,
    pub duration_seconds: Option<f64>,
}

impl ResultUpdate {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn completed(output: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            output: Some(output.into()),
            status: Some(Status::Completed),
            duration_seconds: Some(duration_seconds),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            status: Some(Status::Failed),
            error_flag: Some(true),
            error_message: Some(message.into()),
            duration_seconds: Some(duration_seconds),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_moves_forward() {
        assert!(Status::Pending.can_advance_to(Status::InProgress));
        assert!(Status::InProgress.can_advance_to(Status::Completed));
        assert!(Status::Pending.can_advance_to(Status::Failed));
        assert!(Status::Completed.can_advance_to(Status::Completed));
        assert!(!Status::Completed.can_advance_to(Status::InProgress));
        assert!(!Status::Failed.can_advance_to(Status::Completed));
        assert!(!Status::InProgress.can_advance_to(Status::Pending));
    }

    #[test]
    fn test_profile_defaults() {
        let profile = LaunchProfile::default();
        assert_eq!(profile.product_name(), "Unknown Product");
        assert_eq!(profile.target_market(), "Unknown");
    }
}
