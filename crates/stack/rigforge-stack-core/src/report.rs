//! Per-component build outcome reporting.
//!
//! `build()` returns a structured report instead of throwing on first
//! failure: a ten-component stack reports "7 of 10 components built" rather
//! than stopping at the first problem.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BuildStatus {
    Ok,
    Skipped { reason: String },
    Failed { error: String },
}

impl BuildStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, BuildStatus::Ok)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub index: usize,
    pub identifier: String,
    pub label: Option<String>,
    #[serde(flatten)]
    pub status: BuildStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub components: Vec<ComponentReport>,
}

impl BuildReport {
    pub fn status(&self, index: usize) -> Option<&BuildStatus> {
        self.components
            .iter()
            .find(|c| c.index == index)
            .map(|c| &c.status)
    }

    pub fn built(&self) -> usize {
        self.components
            .iter()
            .filter(|c| c.status.is_ok())
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.components
            .iter()
            .filter(|c| matches!(c.status, BuildStatus::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.components
            .iter()
            .filter(|c| matches!(c.status, BuildStatus::Failed { .. }))
            .count()
    }

    pub fn all_ok(&self) -> bool {
        self.built() == self.components.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} of {} components built",
            self.built(),
            self.components.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts() {
        let report = BuildReport {
            components: vec![
                ComponentReport {
                    index: 0,
                    identifier: "Standard : Root".into(),
                    label: None,
                    status: BuildStatus::Ok,
                },
                ComponentReport {
                    index: 1,
                    identifier: "Standard : Arm".into(),
                    label: Some("Left Arm".into()),
                    status: BuildStatus::Skipped {
                        reason: "Root Joint is empty".into(),
                    },
                },
                ComponentReport {
                    index: 2,
                    identifier: "Standard : Arm".into(),
                    label: Some("Right Arm".into()),
                    status: BuildStatus::Failed {
                        error: "node not found: clavicle".into(),
                    },
                },
            ],
        };
        assert_eq!(report.built(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_ok());
        assert_eq!(report.summary(), "1 of 3 components built");
    }
}
