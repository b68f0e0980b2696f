//! Per-item outcome reports for batch index operations.

use serde::Serialize;

use crate::error::IndexError;

/// One item of a batch that did not complete.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub id: String,
    pub error: IndexError,
}

/// Which items of a batch succeeded and which failed, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

/// Serializable summary of a report, for CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, id: impl Into<String>) {
        self.succeeded.push(id.into());
    }

    pub fn record_failure(&mut self, id: impl Into<String>, error: IndexError) {
        self.failed.push(BatchFailure {
            id: id.into(),
            error,
        });
    }

    /// Mark every id in `ids` as failed with the same error.
    pub fn record_group_failure<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a str>,
        error: &IndexError,
    ) {
        for id in ids {
            self.record_failure(id, error.clone());
        }
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            succeeded: self.succeeded.len(),
            failed: self
                .failed
                .iter()
                .map(|f| (f.id.clone(), f.error.to_string()))
                .collect(),
        }
    }

    /// `Ok` with the succeeded ids when nothing failed; otherwise a
    /// [`IndexError::PartialFailure`] naming each succeeded and failed id.
    pub fn into_result(self) -> Result<Vec<String>, IndexError> {
        if self.failed.is_empty() {
            return Ok(self.succeeded);
        }
        let failed = self.summary().failed;
        Err(IndexError::PartialFailure {
            succeeded: self.succeeded,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_report() {
        let mut report = BatchReport::new();
        report.record_success("a");
        report.record_success("b");
        assert!(report.is_complete());
        assert_eq!(report.into_result().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_partial_report_names_failures() {
        let mut report = BatchReport::new();
        report.record_success("a");
        report.record_group_failure(
            ["b", "c"],
            &IndexError::InvalidInput("bad vector".to_string()),
        );
        assert_eq!(report.total(), 3);
        assert!(!report.is_complete());

        match report.into_result() {
            Err(IndexError::PartialFailure { succeeded, failed }) => {
                assert_eq!(succeeded, ["a"]);
                let ids: Vec<&str> = failed.iter().map(|(id, _)| id.as_str()).collect();
                assert_eq!(ids, ["b", "c"]);
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
    }
}
