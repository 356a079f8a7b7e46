//! Config API client.
//!
//! [`ScmClient`] ties one [`TokenGuard`] and one [`Transport`] to an API base
//! URL. It hands out [`ObjectCreator`]s for batch creation and implements the
//! smaller calls directly:
//! - [`ScmClient::move_rule`] - reposition a security rule
//! - [`ScmClient::list_objects`] / [`ScmClient::list_all`] - read objects in a folder
//! - [`ScmClient::get_object`] - fetch by raw path, with retries

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::creator::{ObjectCreator, RetryPolicy};
use crate::endpoint::{EndpointError, build_endpoint, list_endpoint, move_endpoint, object_endpoint};
use crate::error::ScmforgeError;
use crate::model::ObjectType;
use crate::token_guard::TokenGuard;
use crate::transport::{ApiRequest, ApiResponse, DEFAULT_REQUEST_TIMEOUT, Transport};

/// Page size used by [`ScmClient::list_all`].
pub const DEFAULT_PAGE_LIMIT: u32 = 200;

/// Upper bound on pages fetched by [`ScmClient::list_all`].
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Which half of the policy a rule lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rulebase {
    Pre,
    Post,
}

impl Rulebase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rulebase::Pre => "pre",
            Rulebase::Post => "post",
        }
    }
}

impl FromStr for Rulebase {
    type Err = ScmforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(Rulebase::Pre),
            "post" => Ok(Rulebase::Post),
            other => Err(ScmforgeError::InvalidRequest {
                message: format!("unknown rulebase '{}', expected pre or post", other),
            }),
        }
    }
}

/// Where a moved rule lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDestination {
    Top,
    Bottom,
    Before,
    After,
}

impl MoveDestination {
    /// Whether the destination is relative to another rule.
    pub fn needs_anchor(&self) -> bool {
        matches!(self, MoveDestination::Before | MoveDestination::After)
    }
}

impl FromStr for MoveDestination {
    type Err = ScmforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(MoveDestination::Top),
            "bottom" => Ok(MoveDestination::Bottom),
            "before" => Ok(MoveDestination::Before),
            "after" => Ok(MoveDestination::After),
            other => Err(ScmforgeError::InvalidRequest {
                message: format!(
                    "unknown destination '{}', expected top, bottom, before or after",
                    other
                ),
            }),
        }
    }
}

/// Body of a rule move request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRule {
    pub destination: MoveDestination,
    pub rulebase: Rulebase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_rule: Option<String>,
}

impl MoveRule {
    /// Build a move, checking that `before`/`after` name an anchor rule and
    /// `top`/`bottom` do not.
    pub fn new(
        destination: MoveDestination,
        rulebase: Rulebase,
        destination_rule: Option<String>,
    ) -> Result<Self, ScmforgeError> {
        match (destination.needs_anchor(), destination_rule.is_some()) {
            (true, false) => Err(ScmforgeError::InvalidRequest {
                message: "moving before/after requires a destination rule".to_string(),
            }),
            (false, true) => Err(ScmforgeError::InvalidRequest {
                message: "moving to top/bottom does not take a destination rule".to_string(),
            }),
            _ => Ok(Self {
                destination,
                rulebase,
                destination_rule,
            }),
        }
    }
}

/// One page request against the list endpoint.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub folder: String,
    pub position: Option<Rulebase>,
    pub limit: u32,
    pub offset: u32,
}

impl ListQuery {
    /// First page of a folder with the default page size.
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            position: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }

    pub fn position(mut self, position: Rulebase) -> Self {
        self.position = Some(position);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// Client for one config API deployment.
#[derive(Clone)]
pub struct ScmClient {
    base_url: Url,
    guard: Arc<TokenGuard>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
    max_pages: u32,
}

impl ScmClient {
    pub fn new(base_url: Url, guard: Arc<TokenGuard>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url,
            guard,
            transport,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Override the per-request timeout for every call made through this client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override how many pages [`list_all`](Self::list_all) may fetch.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn guard(&self) -> &Arc<TokenGuard> {
        &self.guard
    }

    /// A creator for `object_type` objects in `folder`.
    pub fn creator(
        &self,
        object_type: ObjectType,
        folder: &str,
        extra_params: &str,
    ) -> Result<ObjectCreator, EndpointError> {
        let endpoint = build_endpoint(&self.base_url, object_type, folder, extra_params)?;
        Ok(
            ObjectCreator::new(self.guard.clone(), self.transport.clone(), endpoint)
                .with_timeout(self.timeout),
        )
    }

    /// Move a security rule within its rulebase.
    pub async fn move_rule(&self, rule_id: &str, request: &MoveRule) -> Result<(), ScmforgeError> {
        let url = move_endpoint(&self.base_url, rule_id)?;
        let body = serde_json::to_value(request).map_err(|e| ScmforgeError::InvalidRequest {
            message: e.to_string(),
        })?;

        let response = self.send(ApiRequest::post(url.as_str()).json(body)).await?;
        if response.status != 200 {
            tracing::error!(rule = %rule_id, status = response.status, "Move failed: {}", response.body);
            return Err(api_error(response));
        }

        tracing::info!(rule = %rule_id, "Moved rule {:?} in {} rulebase", request.destination, request.rulebase.as_str());
        Ok(())
    }

    /// Fetch one page of objects.
    pub async fn list_objects(
        &self,
        object_type: ObjectType,
        query: &ListQuery,
    ) -> Result<Vec<Value>, ScmforgeError> {
        let url = list_endpoint(
            &self.base_url,
            object_type,
            &query.folder,
            query.position.as_ref().map(Rulebase::as_str),
            query.limit,
            query.offset,
        )?;

        let response = self.send(ApiRequest::get(url.as_str())).await?;
        if !response.is_success() {
            return Err(api_error(response));
        }

        match response.body.as_json().and_then(|v| v.get("data")) {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(ScmforgeError::UnexpectedResponse {
                message: format!("list response has no `data` array: {}", response.body),
            }),
        }
    }

    /// Fetch one object (or filtered list) by raw path, returning its `data`.
    ///
    /// Non-200 answers, unusable bodies, and transport errors are retried
    /// after `policy.retry_delay`; the token is re-checked every attempt. An
    /// [`AuthError`](crate::AuthError) ends the call at once.
    pub async fn get_object(&self, path: &str, policy: &RetryPolicy) -> Result<Value, ScmforgeError> {
        let url = object_endpoint(&self.base_url, path)?;
        let max_attempts = policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.send(ApiRequest::get(url.as_str())).await {
                Ok(response) if response.status == 200 => {
                    match response.body.as_json().and_then(|v| v.get("data")) {
                        Some(data) => return Ok(data.clone()),
                        None => ScmforgeError::UnexpectedResponse {
                            message: format!("response has no `data` field: {}", response.body),
                        },
                    }
                }
                Ok(response) => api_error(response),
                Err(e @ ScmforgeError::Auth(_)) => return Err(e),
                Err(e) => e,
            };

            tracing::error!(path = %path, attempt, max_attempts, "Failed to retrieve object: {}", error);
            if attempt >= max_attempts {
                return Err(error);
            }
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    /// Fetch every object in a folder, one page at a time.
    ///
    /// Stops at the first short page. Fails with
    /// [`ScmforgeError::UnexpectedResponse`] after `max_pages` full pages,
    /// which happens when the API ignores `offset`.
    pub async fn list_all(
        &self,
        object_type: ObjectType,
        folder: &str,
        position: Option<Rulebase>,
    ) -> Result<Vec<Value>, ScmforgeError> {
        let mut query = ListQuery::new(folder);
        query.position = position;

        let mut all = Vec::new();
        for _ in 0..self.max_pages {
            let page = self.list_objects(object_type, &query).await?;
            let short_page = page.len() < query.limit as usize;
            all.extend(page);
            if short_page {
                tracing::debug!("Listed {} {} in {}", all.len(), object_type, folder);
                return Ok(all);
            }
            query.offset += query.limit;
        }

        Err(ScmforgeError::UnexpectedResponse {
            message: format!(
                "listing {} in {} did not end after {} pages",
                object_type, folder, self.max_pages
            ),
        })
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ScmforgeError> {
        let token = self.guard.valid_token().await?;
        Ok(self
            .transport
            .call(request.bearer(token).timeout(self.timeout))
            .await?)
    }
}

impl std::fmt::Debug for ScmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScmClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

fn api_error(response: ApiResponse) -> ScmforgeError {
    ScmforgeError::Api {
        status: response.status,
        body: response.body.to_string(),
    }
}
