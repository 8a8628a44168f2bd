use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{
  ACCEPT,
  AUTHORIZATION,
  HeaderMap,
  HeaderValue
};
use tracing::{
  debug,
  warn
};
use uuid::Uuid;

use crate::auth::Credential;
use crate::criteria::Criteria;
use crate::source::{
  CancelResponse,
  SourceError,
  TaskCanceller,
  TaskSource
};
use crate::task::TaskPage;

const REQUEST_ID_HEADER: &str =
  "x-request-id";

/// HTTP client for the task service.
#[derive(Debug, Clone)]
pub struct TesClient {
  http:       reqwest::Client,
  base_url:   String,
  page_size:  u32,
  credential: Option<Credential>
}

impl TesClient {
  pub fn new(
    base_url: &str,
    timeout: Duration,
    page_size: u32,
    credential: Option<Credential>
  ) -> anyhow::Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .context(
        "failed building HTTP client \
         for task service"
      )?;

    Ok(Self {
      http,
      base_url: base_url
        .trim_end_matches('/')
        .to_string(),
      page_size,
      credential
    })
  }

  pub fn tasks_url(&self) -> String {
    format!("{}/tasks/", self.base_url)
  }

  pub fn cancel_url(
    &self,
    uuid: &str
  ) -> String {
    format!(
      "{}/tasks/{uuid}/cancel/",
      self.base_url
    )
  }

  fn headers(
    credential: Option<&Credential>
  ) -> Result<HeaderMap, SourceError> {
    let mut headers = HeaderMap::new();
    headers.insert(
      ACCEPT,
      HeaderValue::from_static(
        "application/json"
      )
    );
    headers.insert(
      REQUEST_ID_HEADER,
      HeaderValue::from_str(
        &Uuid::new_v4().to_string()
      )
      .map_err(|e| {
        SourceError::Transport(e.to_string())
      })?
    );
    if let Some(credential) = credential {
      let value = HeaderValue::from_str(
        &format!(
          "Bearer {}",
          credential.secret()
        )
      )
      .map_err(|_| {
        SourceError::Transport(
          "credential is not a valid \
           header value"
            .to_string()
        )
      })?;
      headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
  }
}

#[async_trait]
impl TaskSource for TesClient {
  #[tracing::instrument(skip(self, criteria), fields(token = %criteria.token, order = %criteria.order, page = criteria.page))]
  async fn fetch(
    &self,
    criteria: &Criteria
  ) -> Result<TaskPage, SourceError> {
    let url = reqwest::Url::parse_with_params(
      &self.tasks_url(),
      criteria.query_pairs(self.page_size)
    )
    .map_err(|e| {
      SourceError::Transport(e.to_string())
    })?;
    let response = self
      .http
      .get(url.clone())
      .headers(Self::headers(
        self.credential.as_ref()
      )?)
      .send()
      .await
      .map_err(|error| {
        warn!(url = %url, error = %error, "failed requesting task list");
        SourceError::Transport(
          error.to_string()
        )
      })?;

    let status = response.status();
    let body =
      response.text().await.map_err(
        |error| {
          SourceError::Transport(
            error.to_string()
          )
        }
      )?;

    if !status.is_success() {
      warn!(status = status.as_u16(), "task list request rejected");
      return Err(SourceError::Status {
        status: status.as_u16(),
        body
      });
    }

    let page: TaskPage =
      serde_json::from_str(&body)
        .map_err(|e| {
          SourceError::Decode(e.to_string())
        })?;
    debug!(
      count = page.count,
      rows = page.results.len(),
      "task list fetched"
    );
    Ok(page)
  }
}

#[async_trait]
impl TaskCanceller for TesClient {
  #[tracing::instrument(skip(self, credential))]
  async fn cancel(
    &self,
    uuid: &str,
    credential: &Credential
  ) -> Result<CancelResponse, SourceError> {
    let url = self.cancel_url(uuid);
    let response = self
      .http
      .post(&url)
      .headers(Self::headers(Some(
        credential
      ))?)
      .send()
      .await
      .map_err(|error| {
        warn!(url = %url, error = %error, "failed requesting task cancel");
        SourceError::Transport(
          error.to_string()
        )
      })?;

    let status = response.status();
    debug!(
      status = status.as_u16(),
      "cancel request answered"
    );
    Ok(CancelResponse {
      ok:     status.is_success(),
      status: status.as_u16()
    })
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::TesClient;
  use crate::auth::Credential;

  #[test]
  fn urls_drop_trailing_slash() {
    let client = TesClient::new(
      "https://tes.example.org/api/v1/",
      Duration::from_secs(5),
      10,
      Some(Credential::new("k"))
    )
    .expect("client");

    assert_eq!(
      client.tasks_url(),
      "https://tes.example.org/api/v1/tasks/"
    );
    assert_eq!(
      client.cancel_url("abc"),
      "https://tes.example.org/api/v1/tasks/abc/cancel/"
    );
  }

  #[test]
  fn headers_carry_bearer_and_request_id() {
    let credential =
      Credential::new("secret");
    let headers =
      TesClient::headers(Some(&credential))
        .expect("headers");
    assert_eq!(
      headers
        .get("authorization")
        .expect("auth header"),
      "Bearer secret"
    );
    assert!(
      headers.contains_key("x-request-id")
    );
  }
}
