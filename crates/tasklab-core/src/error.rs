use thiserror::Error;

use crate::source::SourceError;

#[derive(Debug, Error)]
pub enum ControllerError {
  #[error(
    "search token `{token}` is shorter \
     than {min_chars} characters"
  )]
  ValidationRejected {
    token:     String,
    min_chars: usize
  },

  #[error("fetching tasks failed: {0}")]
  FetchFailed(#[source] SourceError),

  #[error(
    "canceling {uuid} failed: {reason}"
  )]
  CancellationFailed {
    uuid:   String,
    reason: String
  },

  #[error("No login has been configured")]
  NoLoginConfigured,

  #[error(
    "several login providers are \
     configured ({0}); pick one with \
     --login"
  )]
  LoginProviderRequired(String),

  #[error("unknown login provider: {0}")]
  UnknownLoginProvider(String),

  #[error("missing credential: {0}")]
  MissingCredential(String)
}
