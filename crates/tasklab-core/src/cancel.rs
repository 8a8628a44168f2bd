//! Per-row cancel requests and their
//! transient failure banners.
//!
//! Request ids come from one counter
//! shared by all rows. Only the outcome
//! of the most recently issued request
//! on a row may change that row, and a
//! dismissal timer only clears the
//! banner it was started for. A row is
//! forgotten once it shows no banner and
//! has no request in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{
  AtomicU64,
  Ordering
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{
  debug,
  info,
  warn
};

use crate::auth::Credential;
use crate::error::ControllerError;
use crate::source::TaskCanceller;

/// Failure banner shown in place of a
/// row's action cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCancellation {
  pub uuid:    String,
  pub message: String,
  pub visible: bool
}

impl PendingCancellation {
  fn failed(uuid: &str) -> Self {
    Self {
      uuid:    uuid.to_string(),
      message: format!(
        "Canceling {uuid} failed! Please \
         try again."
      ),
      visible: true
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
  Succeeded,
  Failed { reason: String },
  /// A newer request on the same row
  /// was issued before this one
  /// resolved.
  Superseded
}

impl CancelOutcome {
  pub fn into_result(
    self,
    uuid: &str
  ) -> Result<(), ControllerError> {
    match self {
      | CancelOutcome::Failed {
        reason
      } => {
        Err(
          ControllerError::CancellationFailed {
            uuid: uuid.to_string(),
            reason
          }
        )
      }
      | _ => Ok(())
    }
  }
}

#[derive(Default)]
struct RowState {
  latest_request: u64,
  banner:         Option<(
    u64,
    PendingCancellation
  )>,
  timer:          Option<AbortHandle>
}

#[derive(Clone)]
pub struct CancellationCoordinator {
  canceller:    Arc<dyn TaskCanceller>,
  banner_ttl:   Duration,
  next_request: Arc<AtomicU64>,
  rows: Arc<Mutex<HashMap<String, RowState>>>
}

impl CancellationCoordinator {
  pub fn new(
    canceller: Arc<dyn TaskCanceller>,
    banner_ttl: Duration
  ) -> Self {
    Self {
      canceller,
      banner_ttl,
      next_request: Arc::new(
        AtomicU64::new(0)
      ),
      rows: Arc::new(Mutex::new(
        HashMap::new()
      ))
    }
  }

  /// Sends one cancel request and
  /// updates the row's banner from its
  /// outcome.
  #[tracing::instrument(skip(self, credential))]
  pub async fn cancel(
    &self,
    uuid: &str,
    credential: &Credential
  ) -> CancelOutcome {
    let request = self
      .next_request
      .fetch_add(1, Ordering::SeqCst)
      + 1;
    self
      .rows
      .lock()
      .entry(uuid.to_string())
      .or_default()
      .latest_request = request;

    let outcome = match self
      .canceller
      .cancel(uuid, credential)
      .await
    {
      | Ok(response) if response.ok => {
        CancelOutcome::Succeeded
      }
      | Ok(response) => {
        CancelOutcome::Failed {
          reason: format!(
            "service answered HTTP {}",
            response.status
          )
        }
      }
      | Err(err) => {
        CancelOutcome::Failed {
          reason: err.to_string()
        }
      }
    };

    self.settle(uuid, request, outcome)
  }

  /// Cancels every id concurrently. The
  /// result keeps the input order.
  #[tracing::instrument(skip(self, uuids, credential), fields(count = uuids.len()))]
  pub async fn cancel_many(
    &self,
    uuids: &[String],
    credential: &Credential
  ) -> Vec<(String, CancelOutcome)> {
    let handles: Vec<_> = uuids
      .iter()
      .map(|uuid| {
        let this = self.clone();
        let uuid = uuid.clone();
        let credential = credential.clone();
        tokio::spawn(async move {
          this
            .cancel(&uuid, &credential)
            .await
        })
      })
      .collect();

    let mut outcomes =
      Vec::with_capacity(handles.len());
    for (uuid, handle) in
      uuids.iter().zip(handles)
    {
      let outcome = match handle.await {
        | Ok(outcome) => outcome,
        | Err(err) => {
          CancelOutcome::Failed {
            reason: err.to_string()
          }
        }
      };
      outcomes.push((uuid.clone(), outcome));
    }
    outcomes
  }

  pub fn banner(
    &self,
    uuid: &str
  ) -> Option<PendingCancellation> {
    self
      .rows
      .lock()
      .get(uuid)
      .and_then(|row| row.banner.as_ref())
      .map(|(_, banner)| banner.clone())
  }

  fn settle(
    &self,
    uuid: &str,
    request: u64,
    outcome: CancelOutcome
  ) -> CancelOutcome {
    let mut rows = self.rows.lock();
    let Some(row) = rows.get_mut(uuid)
    else {
      return CancelOutcome::Superseded;
    };

    if row.latest_request != request {
      debug!(
        uuid,
        request,
        latest = row.latest_request,
        "dropping outcome of superseded \
         cancel request"
      );
      return CancelOutcome::Superseded;
    }

    if let Some(timer) = row.timer.take() {
      timer.abort();
    }

    match &outcome {
      | CancelOutcome::Succeeded => {
        info!(uuid, "task cancel accepted");
        rows.remove(uuid);
      }
      | CancelOutcome::Failed {
        reason
      } => {
        warn!(uuid, reason = %reason, "task cancel failed");
        row.banner = Some((
          request,
          PendingCancellation::failed(uuid)
        ));
        row.timer =
          Some(self.schedule_dismissal(
            uuid.to_string(),
            request
          ));
      }
      | CancelOutcome::Superseded => {}
    }

    outcome
  }

  fn schedule_dismissal(
    &self,
    uuid: String,
    request: u64
  ) -> AbortHandle {
    let rows = Arc::clone(&self.rows);
    let ttl = self.banner_ttl;
    tokio::spawn(async move {
      tokio::time::sleep(ttl).await;
      let mut rows = rows.lock();
      let Some(row) = rows.get_mut(&uuid)
      else {
        return;
      };
      if !matches!(
        row.banner,
        Some((shown, _)) if shown == request
      ) {
        return;
      }
      debug!(uuid = %uuid, "cancel banner expired");
      if row.latest_request == request {
        rows.remove(&uuid);
      } else {
        row.banner = None;
        row.timer = None;
      }
    })
    .abort_handle()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
use std::sync::atomic::{
  AtomicU64,
  Ordering
};
  use std::time::Duration;

  use async_trait::async_trait;

  use super::{
    CancelOutcome,
    CancellationCoordinator
  };
  use crate::auth::Credential;
  use crate::source::{
    CancelResponse,
    SourceError,
    TaskCanceller
  };

  struct Refuses;

  #[async_trait]
  impl TaskCanceller for Refuses {
    async fn cancel(
      &self,
      _uuid: &str,
      _credential: &Credential
    ) -> Result<CancelResponse, SourceError>
    {
      Err(SourceError::Transport(
        "connection refused".to_string()
      ))
    }
  }

  struct Accepts;

  #[async_trait]
  impl TaskCanceller for Accepts {
    async fn cancel(
      &self,
      _uuid: &str,
      _credential: &Credential
    ) -> Result<CancelResponse, SourceError>
    {
      Ok(CancelResponse {
        ok:     true,
        status: 202
      })
    }
  }

  #[tokio::test]
  async fn accepted_cancel_leaves_no_row_behind()
   {
    let coordinator =
      CancellationCoordinator::new(
        Arc::new(Accepts),
        Duration::from_millis(1000)
      );
    let key = Credential::new("k");

    for uuid in ["a", "b", "c"] {
      assert_eq!(
        coordinator.cancel(uuid, &key).await,
        CancelOutcome::Succeeded
      );
    }
    assert!(coordinator.rows.lock().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn transport_error_shows_banner() {
    let coordinator =
      CancellationCoordinator::new(
        Arc::new(Refuses),
        Duration::from_millis(1000)
      );
    let key = Credential::new("k");

    let outcome = coordinator
      .cancel("t-1", &key)
      .await;
    assert!(matches!(
      outcome,
      CancelOutcome::Failed { .. }
    ));
    assert!(
      outcome
        .clone()
        .into_result("t-1")
        .is_err()
    );

    let banner = coordinator
      .banner("t-1")
      .expect("banner");
    assert_eq!(
      banner.message,
      "Canceling t-1 failed! Please try \
       again."
    );
    assert!(banner.visible);

    tokio::time::sleep(
      Duration::from_millis(1001)
    )
    .await;
    assert!(
      coordinator.banner("t-1").is_none()
    );
    assert!(coordinator.rows.lock().is_empty());
  }
}
