//! The task list: criteria, fetched
//! page, selection and cancel banners
//! kept consistent with each other.

use std::sync::Arc;
use std::sync::atomic::{
  AtomicU64,
  Ordering
};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{
  debug,
  info,
  warn
};

use crate::auth::Credential;
use crate::cancel::{
  CancelOutcome,
  CancellationCoordinator,
  PendingCancellation
};
use crate::config::Settings;
use crate::criteria::{
  Criteria,
  CriteriaStore
};
use crate::error::ControllerError;
use crate::render::RowView;
use crate::selection::SelectionSet;
use crate::sort::{
  self,
  SortColumn,
  SortIndicator
};
use crate::source::{
  SourceError,
  TaskCanceller,
  TaskSource
};
use crate::status_filter::StatusChoice;
use crate::task::{
  TaskPage,
  TaskSummary
};
use crate::validation::SearchInput;

struct ListState {
  page:         Option<TaskPage>,
  fetched_with: Option<Criteria>,
  applied_seq:  u64,
  last_error:   Option<String>,
  selection:    SelectionSet,
  search:       SearchInput
}

/// Runs fetches and applies their
/// results. Holds no store handle, so
/// the fetch loop ends once every
/// store handle is dropped.
#[derive(Clone)]
struct Fetcher {
  source:   Arc<dyn TaskSource>,
  next_seq: Arc<AtomicU64>,
  state:    Arc<Mutex<ListState>>
}

impl Fetcher {
  fn allocate_seq(&self) -> u64 {
    self.next_seq.fetch_add(
      1,
      Ordering::SeqCst
    ) + 1
  }

  async fn fetch(
    &self,
    criteria: Criteria
  ) -> Result<(), SourceError> {
    let seq = self.allocate_seq();
    let result =
      self.source.fetch(&criteria).await;
    self.apply(seq, criteria, result)
  }

  fn spawn(&self, criteria: Criteria) {
    let this = self.clone();
    tokio::spawn(async move {
      let _ = this.fetch(criteria).await;
    });
  }

  /// Stores a fetch result unless a
  /// later-issued fetch already landed.
  /// A failure is recorded and handed
  /// back to the caller.
  fn apply(
    &self,
    seq: u64,
    criteria: Criteria,
    result: Result<TaskPage, SourceError>
  ) -> Result<(), SourceError> {
    let mut state = self.state.lock();
    if seq <= state.applied_seq {
      debug!(
        seq,
        applied = state.applied_seq,
        "discarding stale fetch result"
      );
      return Ok(());
    }
    state.applied_seq = seq;

    match result {
      | Ok(page) => {
        debug!(seq, count = page.count, "task page applied");
        state.page = Some(page);
        state.fetched_with = Some(criteria);
        state.last_error = None;
        Ok(())
      }
      | Err(err) => {
        warn!(seq, error = %err, "task fetch failed");
        state.last_error =
          Some(err.to_string());
        Err(err)
      }
    }
  }
}

#[derive(Clone)]
pub struct TaskListController {
  fetcher:    Fetcher,
  store:      CriteriaStore,
  cancels:    CancellationCoordinator,
  credential: Credential,
  page_size:  u32,
  state:      Arc<Mutex<ListState>>
}

impl TaskListController {
  pub fn new(
    source: Arc<dyn TaskSource>,
    canceller: Arc<dyn TaskCanceller>,
    store: CriteriaStore,
    credential: Credential,
    settings: &Settings
  ) -> Self {
    let search = SearchInput::new(
      &store.get().token,
      settings.min_chars
    );
    let state = Arc::new(Mutex::new(
      ListState {
        page: None,
        fetched_with: None,
        applied_seq: 0,
        last_error: None,
        selection: SelectionSet::new(),
        search
      }
    ));
    Self {
      fetcher: Fetcher {
        source,
        next_seq: Arc::new(
          AtomicU64::new(0)
        ),
        state: Arc::clone(&state)
      },
      cancels: CancellationCoordinator::new(
        canceller,
        settings.banner_ttl
      ),
      store,
      credential,
      page_size: settings.page_size.max(1),
      state
    }
  }

  pub fn store(&self) -> &CriteriaStore {
    &self.store
  }

  pub fn criteria(&self) -> Criteria {
    self.store.get()
  }

  /// Registers the criteria subscription
  /// and fetches once for the current
  /// value. Every later change triggers
  /// a fetch of its own. The loop ends
  /// when the last store handle is
  /// dropped.
  #[tracing::instrument(skip(self))]
  pub fn start(&self) -> JoinHandle<()> {
    let mut subscription =
      self.store.subscribe();
    self.fetcher.spawn(self.store.get());

    let fetcher = self.fetcher.clone();
    tokio::spawn(async move {
      while let Some(criteria) =
        subscription.changed().await
      {
        fetcher.spawn(criteria);
      }
      debug!(
        "criteria store dropped; fetch \
         loop stopped"
      );
    })
  }

  /// Fetches the current criteria and
  /// waits for the result.
  #[tracing::instrument(skip(self))]
  pub async fn refresh(
    &self
  ) -> Result<(), ControllerError> {
    self
      .fetcher
      .fetch(self.store.get())
      .await
      .map_err(ControllerError::FetchFailed)
  }

  /// Latest fetched page; `None` until a
  /// fetch has succeeded.
  pub fn page(&self) -> Option<TaskPage> {
    self.state.lock().page.clone()
  }

  pub fn last_error(
    &self
  ) -> Option<String> {
    self.state.lock().last_error.clone()
  }

  /// Text of the search box. A token
  /// set on the store by someone else
  /// replaces an unedited box.
  pub fn search_value(&self) -> String {
    let token = self.store.get().token;
    let mut state = self.state.lock();
    state.search.sync(&token);
    state.search.value().to_string()
  }

  pub fn validation_message(
    &self
  ) -> Option<String> {
    self.state.lock().search.validation_message()
  }

  pub fn search_input(&self, value: &str) {
    self
      .state
      .lock()
      .search
      .input(value, &self.store);
  }

  pub fn search_commit(
    &self
  ) -> Result<(), ControllerError> {
    let statuses =
      self.store.get().statuses;
    self
      .state
      .lock()
      .search
      .commit(&self.store, &statuses)
  }

  pub fn select_status(
    &self,
    choice: StatusChoice
  ) {
    let token = self.search_value();
    choice.apply(&self.store, &token);
  }

  pub fn toggle_sort(
    &self,
    column: SortColumn
  ) -> String {
    sort::toggle(&self.store, column)
  }

  pub fn sort_indicator(
    &self,
    column: SortColumn
  ) -> SortIndicator {
    SortIndicator::for_column(
      column,
      &self.store.get().order
    )
  }

  /// Index of the last page for the
  /// latest count, if any page is known.
  pub fn last_page(&self) -> Option<u32> {
    let count =
      self.state.lock().page.as_ref()?.count;
    let pages = count
      .div_ceil(u64::from(self.page_size))
      .max(1);
    Some(
      u32::try_from(pages - 1)
        .unwrap_or(u32::MAX)
    )
  }

  pub fn next_page(&self) -> bool {
    let current = self.store.get();
    match self.last_page() {
      | Some(last) if current.page < last => {
        self.store.set(Criteria {
          page: current.page + 1,
          ..current
        })
      }
      | _ => false
    }
  }

  pub fn prev_page(&self) -> bool {
    let current = self.store.get();
    if current.page == 0 {
      return false;
    }
    self.store.set(Criteria {
      page: current.page - 1,
      ..current
    })
  }

  pub fn toggle_selection(
    &self,
    uuid: &str
  ) {
    self.state.lock().selection.toggle(uuid);
  }

  pub fn set_all_selected(
    &self,
    checked: bool
  ) {
    let mut state = self.state.lock();
    let page = state.page.clone();
    state
      .selection
      .set_all(checked, page.as_ref());
  }

  pub fn clear_selection(&self) {
    self.state.lock().selection.clear();
  }

  pub fn selection(&self) -> SelectionSet {
    self.state.lock().selection.clone()
  }

  pub async fn cancel(
    &self,
    uuid: &str
  ) -> CancelOutcome {
    info!(uuid, "cancel requested");
    self
      .cancels
      .cancel(uuid, &self.credential)
      .await
  }

  pub async fn cancel_ids(
    &self,
    uuids: &[String]
  ) -> Vec<(String, CancelOutcome)> {
    self
      .cancels
      .cancel_many(uuids, &self.credential)
      .await
  }

  /// Cancels the selected rows that are
  /// on the current page. Selected ids
  /// no longer on screen are skipped.
  pub async fn cancel_selected(
    &self
  ) -> Vec<(String, CancelOutcome)> {
    let ids = {
      let state = self.state.lock();
      match state.page.as_ref() {
        | Some(page) => {
          state.selection.present_in(page)
        }
        | None => Vec::new()
      }
    };
    if ids.is_empty() {
      debug!("no visible selected rows to cancel");
      return Vec::new();
    }
    self
      .cancels
      .cancel_many(&ids, &self.credential)
      .await
  }

  pub fn banner(
    &self,
    uuid: &str
  ) -> Option<PendingCancellation> {
    self.cancels.banner(uuid)
  }

  /// Per-row data for the table.
  pub fn rows(&self) -> Vec<RowView> {
    let state = self.state.lock();
    let Some(page) = state.page.as_ref()
    else {
      return Vec::new();
    };
    page
      .results
      .iter()
      .map(|task| {
        RowView::new(
          task,
          state.selection.contains(&task.uuid),
          self.cancels.banner(&task.uuid)
        )
      })
      .collect()
  }

  /// Notice shown when the latest fetch
  /// matched nothing. Names the token
  /// that fetch was made with.
  pub fn empty_notice(
    &self
  ) -> Option<String> {
    let state = self.state.lock();
    let page = state.page.as_ref()?;
    if page.count != 0 {
      return None;
    }
    let token = state
      .fetched_with
      .as_ref()
      .map(|criteria| criteria.token.as_str())
      .unwrap_or_default();
    Some(format!(
      "Your search {token} did not match \
       any task!"
    ))
  }

  pub fn find_task(
    &self,
    uuid: &str
  ) -> Option<TaskSummary> {
    self
      .state
      .lock()
      .page
      .as_ref()?
      .find(uuid)
      .cloned()
  }
}
