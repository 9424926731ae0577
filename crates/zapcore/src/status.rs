//! Presentation read model derived from step and run statuses.
//!
//! Pure mappings with no side effects. Raw status strings coming from
//! outside the type system are parsed lossily: anything unrecognized is
//! shown as pending.

use crate::{ExecutionStatus, StepStatus};
use serde::Serialize;

/// Icon shown next to a step or run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusIcon {
    Clock,
    Spinner,
    CheckCircle,
    XCircle,
    SkipForward,
    PauseCircle,
}

/// Badge style category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeVariant {
    Default,
    Secondary,
    Destructive,
    Outline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub label: &'static str,
    pub icon: StatusIcon,
    pub badge: BadgeVariant,
}

impl StepStatus {
    pub fn icon(&self) -> StatusIcon {
        match self {
            StepStatus::Pending => StatusIcon::Clock,
            StepStatus::Running => StatusIcon::Spinner,
            StepStatus::Completed => StatusIcon::CheckCircle,
            StepStatus::Failed => StatusIcon::XCircle,
            StepStatus::Skipped => StatusIcon::SkipForward,
        }
    }

    pub fn badge(&self) -> BadgeVariant {
        match self {
            StepStatus::Pending | StepStatus::Skipped => BadgeVariant::Outline,
            StepStatus::Running => BadgeVariant::Secondary,
            StepStatus::Completed => BadgeVariant::Default,
            StepStatus::Failed => BadgeVariant::Destructive,
        }
    }

    pub fn view(&self) -> StatusView {
        StatusView {
            label: self.as_str(),
            icon: self.icon(),
            badge: self.badge(),
        }
    }

    /// Parse a raw status, treating unknown values as pending.
    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => StepStatus::Running,
            "completed" => StepStatus::Completed,
            "failed" => StepStatus::Failed,
            "skipped" => StepStatus::Skipped,
            _ => StepStatus::Pending,
        }
    }
}

impl ExecutionStatus {
    pub fn icon(&self) -> StatusIcon {
        match self {
            ExecutionStatus::Running => StatusIcon::Spinner,
            ExecutionStatus::Completed => StatusIcon::CheckCircle,
            ExecutionStatus::Failed => StatusIcon::XCircle,
            ExecutionStatus::Paused => StatusIcon::PauseCircle,
        }
    }

    pub fn badge(&self) -> BadgeVariant {
        match self {
            ExecutionStatus::Running => BadgeVariant::Secondary,
            ExecutionStatus::Completed => BadgeVariant::Default,
            ExecutionStatus::Failed => BadgeVariant::Destructive,
            ExecutionStatus::Paused => BadgeVariant::Outline,
        }
    }

    pub fn view(&self) -> StatusView {
        StatusView {
            label: self.as_str(),
            icon: self.icon(),
            badge: self.badge(),
        }
    }

    /// Parse a raw run status. Runs have no pending state, so unknown
    /// values give `None`.
    pub fn parse_lossy(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "failed" => Some(ExecutionStatus::Failed),
            "paused" => Some(ExecutionStatus::Paused),
            _ => None,
        }
    }
}

/// Project a raw run status string; unknown values get the neutral
/// pending view.
pub fn execution_view_lossy(raw: &str) -> StatusView {
    ExecutionStatus::parse_lossy(raw)
        .map(|status| status.view())
        .unwrap_or_else(|| StepStatus::Pending.view())
}

/// Percentage of `processed` out of `total`, clamped to `0..=100`.
pub fn progress_percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (processed.min(total) as f64 * 100.0) / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_step_status_is_pending() {
        assert_eq!(StepStatus::parse_lossy("exploded"), StepStatus::Pending);
        assert_eq!(StepStatus::parse_lossy(" Failed "), StepStatus::Failed);
        assert_eq!(StepStatus::parse_lossy("").icon(), StatusIcon::Clock);
    }

    #[test]
    fn execution_status_parse_is_optional() {
        assert_eq!(ExecutionStatus::parse_lossy(" PAUSED"), Some(ExecutionStatus::Paused));
        assert_eq!(ExecutionStatus::parse_lossy("completed"), Some(ExecutionStatus::Completed));
        assert_eq!(ExecutionStatus::parse_lossy("pending"), None);
        assert_eq!(execution_view_lossy("failed"), ExecutionStatus::Failed.view());
    }

    #[test]
    fn unknown_execution_status_is_neutral() {
        let view = execution_view_lossy("archived");
        assert_eq!(view.label, "pending");
        assert_eq!(view.badge, BadgeVariant::Outline);
        assert_eq!(execution_view_lossy("paused").icon, StatusIcon::PauseCircle);
    }

    #[test]
    fn failures_are_destructive() {
        assert_eq!(StepStatus::Failed.badge(), BadgeVariant::Destructive);
        assert_eq!(ExecutionStatus::Failed.view().icon, StatusIcon::XCircle);
    }

    #[test]
    fn progress_is_fraction_of_total() {
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(1, 4), 25.0);
        assert_eq!(progress_percent(3, 3), 100.0);
        assert_eq!(progress_percent(5, 3), 100.0);
    }
}
