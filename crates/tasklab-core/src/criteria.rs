use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::task::TaskStatus;

pub const DEFAULT_ORDER: &str =
  "-submitted_at";

/// Filter, sort and pagination
/// parameters of the task listing.
#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct Criteria {
  pub token:    String,
  pub statuses: BTreeSet<TaskStatus>,
  pub order:    String,
  pub page:     u32
}

impl Default for Criteria {
  fn default() -> Self {
    Self::with_order(DEFAULT_ORDER)
  }
}

impl Criteria {
  pub fn with_order(
    order: impl Into<String>
  ) -> Self {
    Self {
      token:    String::new(),
      statuses: BTreeSet::new(),
      order:    order.into(),
      page:     0
    }
  }

  /// Query parameters sent to the task
  /// service. Two criteria with equal
  /// pairs denote the same fetch.
  pub fn query_pairs(
    &self,
    page_size: u32
  ) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if !self.token.is_empty() {
      pairs.push((
        "search",
        self.token.clone()
      ));
    }
    for status in &self.statuses {
      pairs
        .push(("status", status.query_key()));
    }
    if !self.order.is_empty() {
      pairs.push((
        "order",
        self.order.clone()
      ));
    }
    pairs
      .push(("page", self.page.to_string()));
    pairs.push((
      "page_size",
      page_size.to_string()
    ));
    pairs
  }
}

/// Shared holder of the current
/// criteria. Clones share one value.
///
/// Writes replace the whole value;
/// there is no partial patching.
#[derive(Debug, Clone)]
pub struct CriteriaStore {
  tx: Arc<watch::Sender<Criteria>>
}

impl Default for CriteriaStore {
  fn default() -> Self {
    Self::new(Criteria::default())
  }
}

impl CriteriaStore {
  pub fn new(initial: Criteria) -> Self {
    let (tx, _rx) =
      watch::channel(initial);
    Self {
      tx: Arc::new(tx)
    }
  }

  pub fn get(&self) -> Criteria {
    self.tx.borrow().clone()
  }

  /// Replaces the criteria. Returns
  /// `false` and notifies nobody when
  /// `next` equals the current value.
  #[tracing::instrument(skip(self), fields(token = %next.token, order = %next.order, page = next.page))]
  pub fn set(
    &self,
    next: Criteria
  ) -> bool {
    let changed =
      self.tx.send_if_modified(
        |current| {
          if *current == next {
            return false;
          }
          *current = next;
          true
        }
      );
    debug!(changed, "criteria set");
    changed
  }

  pub fn subscribe(
    &self
  ) -> CriteriaSubscription {
    CriteriaSubscription {
      rx: self.tx.subscribe()
    }
  }
}

/// Change feed of a [`CriteriaStore`].
#[derive(Debug)]
pub struct CriteriaSubscription {
  rx: watch::Receiver<Criteria>
}

impl CriteriaSubscription {
  /// Waits for the next change and
  /// returns the new value. `None` once
  /// every store handle is gone.
  pub async fn changed(
    &mut self
  ) -> Option<Criteria> {
    self.rx.changed().await.ok()?;
    Some(
      self.rx.borrow_and_update().clone()
    )
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use super::{
    Criteria,
    CriteriaStore
  };
  use crate::task::TaskStatus;

  #[test]
  fn query_pairs_skip_empty_token() {
    let criteria = Criteria {
      token:    String::new(),
      statuses: BTreeSet::from([
        TaskStatus::Error
      ]),
      order:    "uuid".to_string(),
      page:     3
    };

    let pairs = criteria.query_pairs(20);
    assert!(
      !pairs
        .iter()
        .any(|(k, _)| *k == "search")
    );
    assert!(pairs.contains(&(
      "status",
      "error".to_string()
    )));
    assert!(pairs.contains(&(
      "page",
      "3".to_string()
    )));
    assert!(pairs.contains(&(
      "page_size",
      "20".to_string()
    )));
  }

  #[tokio::test]
  async fn identical_set_does_not_notify()
  {
    let store =
      CriteriaStore::default();
    let mut sub = store.subscribe();

    assert!(!store.set(store.get()));

    let next = Criteria {
      page: 2,
      ..store.get()
    };
    assert!(store.set(next.clone()));
    assert_eq!(
      sub.changed().await,
      Some(next)
    );
  }

  #[test]
  fn clones_share_state() {
    let store =
      CriteriaStore::default();
    let sibling = store.clone();
    sibling.set(Criteria {
      token: "bwa".to_string(),
      ..sibling.get()
    });
    assert_eq!(store.get().token, "bwa");
  }
}
