use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Deserializer
};

#[derive(
  Debug,
  Clone,
  Copy,
  Deserialize,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
  Submitted,
  Approved,
  Scheduled,
  Running,
  Completed,
  Error,
  Canceled,
  Rejected
}

impl TaskStatus {
  pub const ALL: [TaskStatus; 8] = [
    TaskStatus::Submitted,
    TaskStatus::Approved,
    TaskStatus::Scheduled,
    TaskStatus::Running,
    TaskStatus::Completed,
    TaskStatus::Error,
    TaskStatus::Canceled,
    TaskStatus::Rejected
  ];

  /// Upper-case label used on the
  /// wire and in tables.
  pub fn label(self) -> &'static str {
    match self {
      | TaskStatus::Submitted => {
        "SUBMITTED"
      }
      | TaskStatus::Approved => {
        "APPROVED"
      }
      | TaskStatus::Scheduled => {
        "SCHEDULED"
      }
      | TaskStatus::Running => "RUNNING",
      | TaskStatus::Completed => {
        "COMPLETED"
      }
      | TaskStatus::Error => "ERROR",
      | TaskStatus::Canceled => {
        "CANCELED"
      }
      | TaskStatus::Rejected => {
        "REJECTED"
      }
    }
  }

  /// Lower-case key sent as the
  /// `status` query parameter.
  pub fn query_key(self) -> String {
    self.label().to_ascii_lowercase()
  }

  /// Whether a cancel request can
  /// still change anything.
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      TaskStatus::Completed
        | TaskStatus::Error
        | TaskStatus::Canceled
        | TaskStatus::Rejected
    )
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for TaskStatus {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let wanted = s.trim();
    TaskStatus::ALL
      .into_iter()
      .find(|status| {
        status
          .label()
          .eq_ignore_ascii_case(wanted)
      })
      .ok_or_else(|| {
        anyhow!(
          "unknown task status: {s}"
        )
      })
  }
}

/// One row of the task listing.
#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct TaskSummary {
  pub uuid:         String,
  pub status:       TaskStatus,
  pub submitted_at: DateTime<Utc>,
  pub updated_at:   DateTime<Utc>
}

#[derive(Debug, Deserialize)]
struct WireTaskState {
  status:     TaskStatus,
  updated_at: DateTime<Utc>
}

#[derive(Debug, Deserialize)]
struct WireTaskSummary {
  uuid:         String,
  submitted_at: DateTime<Utc>,
  state:        WireTaskState
}

impl<'de> Deserialize<'de> for TaskSummary {
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let wire =
      WireTaskSummary::deserialize(
        deserializer
      )?;
    Ok(Self {
      uuid:         wire.uuid,
      status:       wire.state.status,
      submitted_at: wire.submitted_at,
      updated_at:   wire
        .state
        .updated_at
    })
  }
}

/// A single fetch result: the page of
/// rows plus the total match count.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Deserialize,
  Default,
)]
pub struct TaskPage {
  pub count:   u64,
  #[serde(default)]
  pub results: Vec<TaskSummary>
}

impl TaskPage {
  pub fn uuids(&self) -> Vec<String> {
    self
      .results
      .iter()
      .map(|task| task.uuid.clone())
      .collect()
  }

  pub fn find(
    &self,
    uuid: &str
  ) -> Option<&TaskSummary> {
    self
      .results
      .iter()
      .find(|task| task.uuid == uuid)
  }
}

#[cfg(test)]
mod tests {
  use super::{
    TaskPage,
    TaskStatus
  };

  #[test]
  fn parses_nested_wire_format() {
    let raw = r#"{
      "count": 1,
      "results": [{
        "uuid": "c3a1",
        "submitted_at": "2024-03-01T10:00:00Z",
        "state": {
          "status": "RUNNING",
          "updated_at": "2024-03-01T10:05:00Z"
        }
      }]
    }"#;

    let page: TaskPage =
      serde_json::from_str(raw)
        .expect("parse page");
    assert_eq!(page.count, 1);
    let task = &page.results[0];
    assert_eq!(task.uuid, "c3a1");
    assert_eq!(
      task.status,
      TaskStatus::Running
    );
    assert!(
      task.updated_at
        >= task.submitted_at
    );
  }

  #[test]
  fn status_parsing_ignores_case() {
    assert_eq!(
      "canceled"
        .parse::<TaskStatus>()
        .expect("parse"),
      TaskStatus::Canceled
    );
    assert_eq!(
      TaskStatus::Running.query_key(),
      "running"
    );
    assert!(
      "paused"
        .parse::<TaskStatus>()
        .is_err()
    );
  }
}
