use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::debug;

use crate::criteria::{
  Criteria,
  CriteriaStore
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum SortColumn {
  Uuid,
  SubmittedAt
}

impl SortColumn {
  pub const ALL: [SortColumn; 2] = [
    SortColumn::Uuid,
    SortColumn::SubmittedAt
  ];

  pub fn key(self) -> &'static str {
    match self {
      | SortColumn::Uuid => "uuid",
      | SortColumn::SubmittedAt => {
        "submitted_at"
      }
    }
  }
}

impl fmt::Display for SortColumn {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.key())
  }
}

impl FromStr for SortColumn {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    SortColumn::ALL
      .into_iter()
      .find(|column| column.key() == s)
      .ok_or_else(|| {
        anyhow!(
          "not a sortable column: {s}"
        )
      })
  }
}

/// Order that results from clicking
/// `column`'s toggle: ascending first,
/// descending on the second click.
pub fn next_order(
  column: &str,
  current: &str
) -> String {
  if current == column {
    format!("-{column}")
  } else {
    column.to_string()
  }
}

/// Clicks `column`'s toggle, keeping
/// every other criteria field.
#[tracing::instrument(skip(store))]
pub fn toggle(
  store: &CriteriaStore,
  column: SortColumn
) -> String {
  let current = store.get();
  let order =
    next_order(column.key(), &current.order);
  debug!(from = %current.order, to = %order, "sort toggled");
  store.set(Criteria {
    order: order.clone(),
    ..current
  });
  order
}

/// Header arrow state for one column.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct SortIndicator {
  pub active:     bool,
  pub descending: bool
}

impl SortIndicator {
  pub fn for_column(
    column: SortColumn,
    current: &str
  ) -> Self {
    let active =
      current.ends_with(column.key());
    Self {
      active,
      descending: active
        && current.starts_with('-')
    }
  }

  pub fn arrow(self) -> &'static str {
    if self.descending {
      "Z-A"
    } else {
      "A-Z"
    }
  }
}

#[cfg(test)]
mod tests {
  use super::{
    SortColumn,
    SortIndicator,
    next_order,
    toggle
  };
  use crate::criteria::{
    Criteria,
    CriteriaStore
  };

  #[test]
  fn same_column_flips_to_descending() {
    assert_eq!(
      next_order("uuid", "uuid"),
      "-uuid"
    );
    assert_eq!(
      next_order("uuid", "-uuid"),
      "uuid"
    );
    assert_eq!(
      next_order("uuid", "-submitted_at"),
      "uuid"
    );
    assert_eq!(
      next_order("uuid", ""),
      "uuid"
    );
  }

  #[test]
  fn clicking_submission_twice() {
    let store =
      CriteriaStore::new(Criteria {
        token: "ab".to_string(),
        ..Criteria::with_order("uuid")
      });

    toggle(
      &store,
      SortColumn::SubmittedAt
    );
    assert_eq!(
      store.get().order,
      "submitted_at"
    );

    toggle(
      &store,
      SortColumn::SubmittedAt
    );
    let criteria = store.get();
    assert_eq!(
      criteria.order,
      "-submitted_at"
    );
    assert_eq!(criteria.token, "ab");
  }

  #[test]
  fn indicator_tracks_active_column() {
    let desc = SortIndicator::for_column(
      SortColumn::SubmittedAt,
      "-submitted_at"
    );
    assert!(desc.active);
    assert!(desc.descending);
    assert_eq!(desc.arrow(), "Z-A");

    let other = SortIndicator::for_column(
      SortColumn::Uuid,
      "-submitted_at"
    );
    assert!(!other.active);
    assert!(!other.descending);
  }
}
