use std::collections::BTreeSet;

use tracing::{
  debug,
  info
};

use crate::criteria::{
  Criteria,
  CriteriaStore
};
use crate::error::ControllerError;
use crate::task::TaskStatus;

pub const DEFAULT_MIN_CHARS: usize = 2;

/// State of the free-text search box.
///
/// Keystrokes only touch this struct;
/// the criteria store is written on an
/// explicit commit, or when the box is
/// cleared.
#[derive(Debug, Clone)]
pub struct SearchInput {
  value:           String,
  /// Token last known to be in the
  /// store.
  applied:         String,
  typed_chars:     usize,
  show_validation: bool,
  min_chars:       usize
}

impl SearchInput {
  pub fn new(
    initial: &str,
    min_chars: usize
  ) -> Self {
    Self {
      value: initial.to_string(),
      applied: initial.to_string(),
      typed_chars: initial
        .chars()
        .count(),
      show_validation: false,
      min_chars
    }
  }

  pub fn value(&self) -> &str {
    &self.value
  }

  pub fn min_chars(&self) -> usize {
    self.min_chars
  }

  pub fn show_validation(&self) -> bool {
    self.show_validation
  }

  pub fn validation_message(
    &self
  ) -> Option<String> {
    if !self.show_validation {
      return None;
    }
    Some(match self.min_chars {
      | 2 => {
        "Please type at least two \
         characters!"
          .to_string()
      }
      | n => {
        format!(
          "Please type at least {n} \
           characters!"
        )
      }
    })
  }

  /// Follows a token written to the
  /// store by another consumer. Text
  /// the user has typed but not
  /// committed is kept.
  pub fn sync(&mut self, token: &str) {
    if token == self.applied {
      return;
    }
    let edited = self.value != self.applied;
    self.applied = token.to_string();
    if edited {
      return;
    }
    debug!(token, "search box follows store");
    self.value = token.to_string();
    self.typed_chars =
      token.chars().count();
    self.show_validation = false;
  }

  /// A non-commit keystroke. Clearing
  /// the box restores the unfiltered
  /// view right away.
  #[tracing::instrument(skip(self, store), fields(len = value.len()))]
  pub fn input(
    &mut self,
    value: &str,
    store: &CriteriaStore
  ) {
    self.value = value.to_string();
    self.typed_chars =
      value.chars().count();
    self.show_validation = false;

    if value.is_empty() {
      debug!(
        "search cleared; dropping token \
         and status filters"
      );
      self.applied.clear();
      store.set(Criteria {
        token: String::new(),
        statuses: BTreeSet::new(),
        ..store.get()
      });
    }
  }

  /// The commit gesture (Enter). Applies
  /// the pending token and jumps back
  /// to the first page.
  #[tracing::instrument(skip(self, store, statuses), fields(token = %self.value))]
  pub fn commit(
    &mut self,
    store: &CriteriaStore,
    statuses: &BTreeSet<TaskStatus>
  ) -> Result<(), ControllerError> {
    if self.typed_chars < self.min_chars
    {
      self.show_validation = true;
      debug!(
        typed = self.typed_chars,
        min = self.min_chars,
        "search rejected"
      );
      return Err(
        ControllerError::ValidationRejected {
          token:     self.value.clone(),
          min_chars: self.min_chars
        }
      );
    }

    self.show_validation = false;
    self.applied = self.value.clone();
    info!(token = %self.value, "applying search");
    store.set(Criteria {
      token: self.value.clone(),
      statuses: statuses.clone(),
      page: 0,
      ..store.get()
    });
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use super::SearchInput;
  use crate::criteria::{
    Criteria,
    CriteriaStore
  };
  use crate::error::ControllerError;
  use crate::task::TaskStatus;

  fn store_on_page(
    page: u32
  ) -> CriteriaStore {
    CriteriaStore::new(Criteria {
      page,
      ..Criteria::default()
    })
  }

  #[test]
  fn short_token_is_rejected_without_mutation()
   {
    let store = store_on_page(4);
    let before = store.get();
    let mut input =
      SearchInput::new("", 2);

    input.input("a", &store);
    let err = input
      .commit(&store, &BTreeSet::new())
      .expect_err("one char");

    assert!(matches!(
      err,
      ControllerError::ValidationRejected {
        min_chars: 2,
        ..
      }
    ));
    assert!(input.show_validation());
    assert_eq!(store.get(), before);
  }

  #[test]
  fn threshold_length_commits_and_resets_page()
   {
    let store = store_on_page(4);
    let mut input =
      SearchInput::new("", 2);

    input.input("ab", &store);
    input
      .commit(&store, &BTreeSet::new())
      .expect("two chars");

    let criteria = store.get();
    assert_eq!(criteria.token, "ab");
    assert_eq!(criteria.page, 0);
    assert!(!input.show_validation());
  }

  #[test]
  fn next_keystroke_hides_message() {
    let store = store_on_page(0);
    let mut input =
      SearchInput::new("", 2);

    input.input("x", &store);
    let _ = input
      .commit(&store, &BTreeSet::new());
    assert!(
      input
        .validation_message()
        .is_some()
    );

    input.input("xy", &store);
    assert!(
      input
        .validation_message()
        .is_none()
    );
  }

  #[test]
  fn clearing_resets_token_and_statuses()
   {
    let store =
      CriteriaStore::new(Criteria {
        token: "bwa".to_string(),
        statuses: BTreeSet::from([
          TaskStatus::Running
        ]),
        page: 2,
        ..Criteria::default()
      });
    let mut input =
      SearchInput::new("bwa", 2);

    input.input("", &store);

    let criteria = store.get();
    assert!(criteria.token.is_empty());
    assert!(criteria.statuses.is_empty());
    assert_eq!(criteria.page, 2);
  }

  #[test]
  fn threshold_counts_characters_not_bytes()
   {
    let store = store_on_page(0);
    let mut input =
      SearchInput::new("", 2);

    input.input("é", &store);
    assert!(
      input
        .commit(&store, &BTreeSet::new())
        .is_err()
    );
  }

  #[test]
  fn box_follows_store_unless_edited() {
    let store = store_on_page(0);
    let mut input =
      SearchInput::new("", 2);

    input.sync("ab");
    assert_eq!(input.value(), "ab");

    input.input("xyz", &store);
    input.sync("cd");
    assert_eq!(input.value(), "xyz");

    input
      .commit(&store, &BTreeSet::new())
      .expect("three chars");
    input.sync("xyz");
    assert_eq!(input.value(), "xyz");
  }
}
