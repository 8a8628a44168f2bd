//! Seams to the task execution service.
//!
//! The controller never talks HTTP
//! itself; it goes through these two
//! traits so tests can swap in
//! in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Credential;
use crate::criteria::Criteria;
use crate::task::TaskPage;

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("request failed: {0}")]
  Transport(String),

  #[error(
    "service returned HTTP {status}: \
     {body}"
  )]
  Status { status: u16, body: String },

  #[error("malformed response: {0}")]
  Decode(String)
}

/// Outcome of a cancel call that
/// reached the service.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct CancelResponse {
  pub ok:     bool,
  pub status: u16
}

/// Supplies pages of task summaries for
/// a given set of criteria.
#[async_trait]
pub trait TaskSource: Send + Sync {
  async fn fetch(
    &self,
    criteria: &Criteria
  ) -> Result<TaskPage, SourceError>;
}

/// Issues cancel requests on behalf of
/// an authenticated user.
#[async_trait]
pub trait TaskCanceller: Send + Sync {
  async fn cancel(
    &self,
    uuid: &str,
    credential: &Credential
  ) -> Result<CancelResponse, SourceError>;
}
