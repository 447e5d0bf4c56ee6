//! REST surface consumed by the editor.
//!
//! The backend is an opaque collaborator; [`PcvApi`] captures only the calls
//! the engine depends on. A 2xx from a mutation means "accepted", never
//! "applied": the authoritative state arrives through a push-triggered
//! re-fetch.
//!
//! ```text
//! GET    /v1/pcv/status/{uid}                session liveness
//! GET    /v1/pcv/data/{uid}                  { vipPackages, activePackages }
//! GET    /v1/pcv/data/{uid}/{type}           one collection
//! POST   /v1/pcv/data/{uid}/{type}           create / update one item
//! DELETE /v1/pcv/data/{uid}/{type}/{key}     delete one item
//! POST   /v1/pcv/scrape/{uid}/{target}       async reload, completion via push
//! ```

use crate::config::SyncConfig;
use crate::error::ApiError;
use crate::types::{ActiveGrant, Code, EditorSnapshot, ResourceKind, Uid, VipPackage};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Server-side reload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeTarget {
    Codes,
    Vips,
    ActiveVips,
}

impl ScrapeTarget {
    pub fn path_segment(self) -> &'static str {
        match self {
            ScrapeTarget::Codes => "codes",
            ScrapeTarget::Vips => "vips",
            ScrapeTarget::ActiveVips => "activevips",
        }
    }

    /// Collection whose "scrape in progress" flag this target sets.
    pub fn resource(self) -> ResourceKind {
        match self {
            ScrapeTarget::Codes => ResourceKind::Codes,
            ScrapeTarget::Vips => ResourceKind::Packages,
            ScrapeTarget::ActiveVips => ResourceKind::Grants,
        }
    }
}

#[async_trait]
pub trait PcvApi: Send + Sync + 'static {
    /// `Ok` when the uid has a live backend session.
    async fn session_status(&self, uid: &Uid) -> Result<(), ApiError>;

    async fn fetch_snapshot(&self, uid: &Uid) -> Result<EditorSnapshot, ApiError>;

    async fn fetch_packages(&self, uid: &Uid) -> Result<Vec<VipPackage>, ApiError>;

    async fn fetch_grants(&self, uid: &Uid) -> Result<Vec<ActiveGrant>, ApiError>;

    async fn fetch_codes(&self, uid: &Uid) -> Result<Vec<Code>, ApiError>;

    async fn request_scrape(&self, uid: &Uid, target: ScrapeTarget) -> Result<(), ApiError>;

    async fn save_package(&self, uid: &Uid, package: &VipPackage) -> Result<(), ApiError>;

    async fn save_grant(&self, uid: &Uid, grant: &ActiveGrant) -> Result<(), ApiError>;

    async fn save_code(&self, uid: &Uid, code: &Code) -> Result<(), ApiError>;

    async fn delete(&self, uid: &Uid, kind: ResourceKind, key: &str) -> Result<(), ApiError>;
}

/// [`PcvApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpApi {
    pub fn new(config: &SyncConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.api_base_url).map_err(|e| ApiError::Url(e.to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.url(segments)?;
        debug!(%method, %url, "REST request");
        let builder = self.client.request(method, url);
        Ok(match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn fetch_list<T: DeserializeOwned + Send>(&self, uid: &Uid, kind: ResourceKind) -> Result<Vec<T>, ApiError> {
        let response = self
            .request(Method::GET, &["v1", "pcv", "data", uid.as_str(), kind.path_segment()])?
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post_item<T: serde::Serialize + Sync>(
        &self,
        uid: &Uid,
        kind: ResourceKind,
        item: &T,
    ) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, &["v1", "pcv", "data", uid.as_str(), kind.path_segment()])?
            .json(item)
            .send()
            .await?;
        check(response).await.map(drop)
    }
}

/// Maps non-2xx responses to [`ApiError::Status`] carrying the body text.
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PcvApi for HttpApi {
    async fn session_status(&self, uid: &Uid) -> Result<(), ApiError> {
        let response = self
            .request(Method::GET, &["v1", "pcv", "status", uid.as_str()])?
            .send()
            .await?;
        check(response).await.map(drop)
    }

    async fn fetch_snapshot(&self, uid: &Uid) -> Result<EditorSnapshot, ApiError> {
        let response = self
            .request(Method::GET, &["v1", "pcv", "data", uid.as_str()])?
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn fetch_packages(&self, uid: &Uid) -> Result<Vec<VipPackage>, ApiError> {
        self.fetch_list(uid, ResourceKind::Packages).await
    }

    async fn fetch_grants(&self, uid: &Uid) -> Result<Vec<ActiveGrant>, ApiError> {
        self.fetch_list(uid, ResourceKind::Grants).await
    }

    async fn fetch_codes(&self, uid: &Uid) -> Result<Vec<Code>, ApiError> {
        self.fetch_list(uid, ResourceKind::Codes).await
    }

    async fn request_scrape(&self, uid: &Uid, target: ScrapeTarget) -> Result<(), ApiError> {
        let response = self
            .request(Method::POST, &["v1", "pcv", "scrape", uid.as_str(), target.path_segment()])?
            .send()
            .await?;
        check(response).await.map(drop)
    }

    async fn save_package(&self, uid: &Uid, package: &VipPackage) -> Result<(), ApiError> {
        self.post_item(uid, ResourceKind::Packages, package).await
    }

    async fn save_grant(&self, uid: &Uid, grant: &ActiveGrant) -> Result<(), ApiError> {
        self.post_item(uid, ResourceKind::Grants, grant).await
    }

    async fn save_code(&self, uid: &Uid, code: &Code) -> Result<(), ApiError> {
        self.post_item(uid, ResourceKind::Codes, code).await
    }

    async fn delete(&self, uid: &Uid, kind: ResourceKind, key: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::DELETE, &["v1", "pcv", "data", uid.as_str(), kind.path_segment(), key])?
            .send()
            .await?;
        check(response).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpApi {
        let config = SyncConfig {
            api_base_url: base.to_string(),
            ..SyncConfig::default()
        };
        HttpApi::new(&config).unwrap()
    }

    #[test]
    fn builds_encoded_paths() {
        let api = api("https://portal.example.com/api/");
        let url = api
            .url(&["v1", "pcv", "data", "abc", "code", "A B/C"])
            .unwrap();
        assert_eq!(url.as_str(), "https://portal.example.com/api/v1/pcv/data/abc/code/A%20B%2FC");
    }

    #[test]
    fn base_without_trailing_slash() {
        let api = api("http://localhost:3000");
        let url = api.url(&["v1", "pcv", "status", "u1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/v1/pcv/status/u1");
    }

    #[test]
    fn scrape_targets_map_to_collections() {
        assert_eq!(ScrapeTarget::ActiveVips.path_segment(), "activevips");
        assert_eq!(ScrapeTarget::Vips.resource(), ResourceKind::Packages);
    }
}
