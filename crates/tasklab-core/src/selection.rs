use std::collections::BTreeSet;

use crate::task::TaskPage;

/// Task ids checked for bulk actions.
///
/// Kept across refetches and never
/// pruned, so it may name tasks that
/// are no longer on screen.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct SelectionSet {
  ids: BTreeSet<String>
}

impl SelectionSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn toggle(&mut self, uuid: &str) {
    if !self.ids.remove(uuid) {
      self.ids.insert(uuid.to_string());
    }
  }

  pub fn select_all<I, S>(
    &mut self,
    ids: I
  ) where
    I: IntoIterator<Item = S>,
    S: Into<String>
  {
    self.ids =
      ids.into_iter().map(Into::into).collect();
  }

  pub fn clear(&mut self) {
    self.ids.clear();
  }

  /// The header checkbox: checked
  /// selects every row of `page`,
  /// unchecked empties the set.
  pub fn set_all(
    &mut self,
    checked: bool,
    page: Option<&TaskPage>
  ) {
    match (checked, page) {
      | (true, Some(page)) => {
        self.select_all(page.uuids())
      }
      | _ => self.clear()
    }
  }

  pub fn contains(
    &self,
    uuid: &str
  ) -> bool {
    self.ids.contains(uuid)
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = &str> {
    self.ids.iter().map(String::as_str)
  }

  /// Selected ids that are rows of
  /// `page`, in page order.
  pub fn present_in(
    &self,
    page: &TaskPage
  ) -> Vec<String> {
    page
      .results
      .iter()
      .filter(|task| {
        self.ids.contains(&task.uuid)
      })
      .map(|task| task.uuid.clone())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::SelectionSet;
  use crate::task::{
    TaskPage,
    TaskStatus,
    TaskSummary
  };

  fn page(ids: &[&str]) -> TaskPage {
    let at = Utc
      .with_ymd_and_hms(
        2024, 5, 1, 8, 0, 0
      )
      .single()
      .expect("valid time");
    TaskPage {
      count:   ids.len() as u64,
      results: ids
        .iter()
        .map(|id| TaskSummary {
          uuid:         id.to_string(),
          status:       TaskStatus::Submitted,
          submitted_at: at,
          updated_at:   at
        })
        .collect()
    }
  }

  #[test]
  fn toggle_is_its_own_inverse() {
    let mut set = SelectionSet::new();
    set.toggle("a");
    let before = set.clone();

    set.toggle("b");
    set.toggle("b");
    assert_eq!(set, before);

    set.toggle("a");
    set.toggle("a");
    assert_eq!(set, before);
  }

  #[test]
  fn select_all_then_clear_is_empty() {
    let mut set = SelectionSet::new();
    set.toggle("stale");
    set.select_all(["x", "y", "z"]);
    assert_eq!(set.len(), 3);
    assert!(!set.contains("stale"));

    set.clear();
    assert!(set.is_empty());
  }

  #[test]
  fn stale_ids_are_tolerated() {
    let mut set = SelectionSet::new();
    set.toggle("gone");
    set.toggle("b");

    let visible = page(&["a", "b"]);
    assert_eq!(
      set.present_in(&visible),
      vec!["b".to_string()]
    );
    assert!(set.contains("gone"));
  }

  #[test]
  fn header_checkbox_follows_page() {
    let mut set = SelectionSet::new();
    let visible = page(&["a", "b"]);

    set.set_all(true, Some(&visible));
    assert_eq!(
      set.iter().collect::<Vec<_>>(),
      vec!["a", "b"]
    );

    set.set_all(false, Some(&visible));
    assert!(set.is_empty());

    set.set_all(true, None);
    assert!(set.is_empty());
  }
}
