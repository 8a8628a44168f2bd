use std::fmt;

use tracing::{
  debug,
  info
};

use crate::config::Config;
use crate::error::ControllerError;

const API_KEY_ENV_VAR: &str =
  "TASKLAB_API_KEY";

/// Opaque bearer token for the task
/// service. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
  pub fn new(
    secret: impl Into<String>
  ) -> Self {
    Self(secret.into())
  }

  pub fn secret(&self) -> &str {
    &self.0
  }

  /// First eight characters followed by
  /// an ellipsis.
  pub fn masked(&self) -> String {
    let head: String =
      self.0.chars().take(8).collect();
    format!("{head}...")
  }
}

impl fmt::Debug for Credential {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_tuple("Credential")
      .field(&self.masked())
      .finish()
  }
}

pub trait LoginProvider: Send + Sync {
  fn id(&self) -> &'static str;

  fn name(&self) -> &'static str;

  fn login(
    &self,
    cfg: &Config
  ) -> Result<Credential, ControllerError>;
}

/// Logs in with a static API key taken
/// from `api.key` or `TASKLAB_API_KEY`.
#[derive(Debug, Default)]
pub struct ApiKeyProvider;

impl LoginProvider for ApiKeyProvider {
  fn id(&self) -> &'static str {
    "api_key"
  }

  fn name(&self) -> &'static str {
    "API key"
  }

  fn login(
    &self,
    cfg: &Config
  ) -> Result<Credential, ControllerError>
  {
    let key = cfg
      .get("api.key")
      .filter(|key| !key.trim().is_empty())
      .or_else(|| {
        std::env::var(API_KEY_ENV_VAR)
          .ok()
          .filter(|key| {
            !key.trim().is_empty()
          })
      })
      .ok_or_else(|| {
        ControllerError::MissingCredential(
          format!(
            "set api.key or \
             {API_KEY_ENV_VAR}"
          )
        )
      })?;
    Ok(Credential::new(key.trim()))
  }
}

/// The login methods enabled by
/// `auth.providers`.
pub struct LoginProviders {
  providers: Vec<Box<dyn LoginProvider>>
}

impl LoginProviders {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(cfg: &Config) -> Self {
    let wanted = cfg
      .get("auth.providers")
      .unwrap_or_default();
    let mut providers: Vec<
      Box<dyn LoginProvider>
    > = Vec::new();

    for id in wanted
      .split(',')
      .map(str::trim)
      .filter(|id| !id.is_empty())
    {
      if providers.iter().any(|p| p.id() == id)
      {
        debug!(
          provider = id,
          "login provider listed twice"
        );
        continue;
      }
      match id {
        | "api_key" => {
          providers
            .push(Box::new(ApiKeyProvider))
        }
        | other => {
          tracing::warn!(
            provider = other,
            "ignoring unknown login \
             provider"
          );
        }
      }
    }

    debug!(
      count = providers.len(),
      "login providers configured"
    );
    Self {
      providers
    }
  }

  pub fn list(
    &self
  ) -> Vec<(&'static str, &'static str)>
  {
    self
      .providers
      .iter()
      .map(|p| (p.id(), p.name()))
      .collect()
  }

  /// Logs in through `id`, or through
  /// the only provider when exactly one
  /// is configured.
  #[tracing::instrument(skip(self, cfg))]
  pub fn login(
    &self,
    id: Option<&str>,
    cfg: &Config
  ) -> Result<Credential, ControllerError>
  {
    if self.providers.is_empty() {
      return Err(
        ControllerError::NoLoginConfigured
      );
    }

    let provider = match id {
      | Some(id) => self
        .providers
        .iter()
        .find(|p| p.id() == id)
        .ok_or_else(|| {
          ControllerError::UnknownLoginProvider(
            id.to_string()
          )
        })?,
      | None => match self.providers.as_slice() {
        | [only] => only,
        | _ => {
          return Err(
            ControllerError::LoginProviderRequired(
              self
                .providers
                .iter()
                .map(|p| p.id())
                .collect::<Vec<_>>()
                .join(", ")
            )
          );
        }
      }
    };

    let credential = provider.login(cfg)?;
    info!(
      provider = provider.id(),
      key = %credential.masked(),
      "logged in"
    );
    Ok(credential)
  }
}
