use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::criteria::{
  Criteria,
  CriteriaStore
};
use crate::task::TaskStatus;

/// Entry of the single-select status
/// dropdown.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum StatusChoice {
  All,
  Only(TaskStatus)
}

impl StatusChoice {
  pub fn options() -> Vec<StatusChoice> {
    std::iter::once(StatusChoice::All)
      .chain(
        TaskStatus::ALL
          .into_iter()
          .map(StatusChoice::Only)
      )
      .collect()
  }

  pub fn statuses(
    self
  ) -> BTreeSet<TaskStatus> {
    match self {
      | StatusChoice::All => {
        BTreeSet::new()
      }
      | StatusChoice::Only(status) => {
        BTreeSet::from([status])
      }
    }
  }

  /// Commits the choice at once. The
  /// search box's current text goes
  /// along with it; the page index is
  /// left alone.
  #[tracing::instrument(skip(store))]
  pub fn apply(
    self,
    store: &CriteriaStore,
    token: &str
  ) -> bool {
    info!(choice = %self, "status filter selected");
    store.set(Criteria {
      token: token.to_string(),
      statuses: self.statuses(),
      ..store.get()
    })
  }
}

impl fmt::Display for StatusChoice {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | StatusChoice::All => {
        f.write_str("ALL")
      }
      | StatusChoice::Only(status) => {
        write!(f, "{status}")
      }
    }
  }
}

impl FromStr for StatusChoice {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim().eq_ignore_ascii_case("all")
    {
      return Ok(StatusChoice::All);
    }
    s.parse::<TaskStatus>()
      .map(StatusChoice::Only)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use super::StatusChoice;
  use crate::criteria::{
    Criteria,
    CriteriaStore
  };
  use crate::task::TaskStatus;

  #[test]
  fn selection_replaces_previous_status()
   {
    let store = CriteriaStore::default();

    StatusChoice::Only(
      TaskStatus::Running
    )
    .apply(&store, "");
    StatusChoice::Only(
      TaskStatus::Error
    )
    .apply(&store, "");

    assert_eq!(
      store.get().statuses,
      BTreeSet::from([TaskStatus::Error])
    );

    StatusChoice::All.apply(&store, "");
    assert!(
      store.get().statuses.is_empty()
    );
  }

  #[test]
  fn status_change_keeps_page() {
    let store =
      CriteriaStore::new(Criteria {
        page: 5,
        ..Criteria::default()
      });

    StatusChoice::Only(
      TaskStatus::Completed
    )
    .apply(&store, "ab");

    let criteria = store.get();
    assert_eq!(criteria.page, 5);
    assert_eq!(criteria.token, "ab");
  }

  #[test]
  fn options_start_with_all() {
    let options =
      StatusChoice::options();
    assert_eq!(options.len(), 9);
    assert_eq!(
      options[0],
      StatusChoice::All
    );
    assert_eq!(
      "ALL"
        .parse::<StatusChoice>()
        .expect("parse"),
      StatusChoice::All
    );
  }
}
