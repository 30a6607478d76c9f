use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkg_types::lease::{
    ConditionalDeleteRequest, ConditionalUpdateRequest, DeleteResponse, LeasePredicate,
    LeaseRecord, LeaseUpdate, PurgeRequest, PurgeResponse, UpdatedLease,
};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::store::{LeaseStore, StoreError};

/// Lease store client speaking to a `solo-leased` server over HTTP.
///
/// The server evaluates every conditional operation atomically; this client
/// only maps transport failures onto the store error taxonomy.
#[derive(Clone)]
pub struct RemoteLeaseStore {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl RemoteLeaseStore {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid lease server url {}: {}", base_url, e))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("Invalid lease server url {}: not a base url", base_url);
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: parsed,
            token,
        })
    }

    /// `<base>/api/v1/leases/<segments...>`. Each segment is percent-encoded,
    /// so an id containing `/`, `?` or `#` stays one path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["api", "v1", "leases"])
                .extend(segments);
        }
        url
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, StoreError> {
        let req = match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        req.send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, StoreError> {
        resp.json::<T>()
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid response body: {}", e)))
    }
}

/// Classify a non-success status. 409 is the only status with lease meaning.
fn status_error(status: StatusCode, id: &str) -> StoreError {
    match status {
        StatusCode::CONFLICT => StoreError::AlreadyExists(id.to_string()),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Unavailable(format!("lease server returned {}", s))
        }
        s => StoreError::Rejected(format!("lease server returned {}", s)),
    }
}

#[async_trait]
impl LeaseStore for RemoteLeaseStore {
    async fn insert_if_absent(&self, record: &LeaseRecord) -> Result<(), StoreError> {
        let resp = self
            .send(self.client.post(self.url(&[])).json(record))
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            s => Err(status_error(s, &record.id)),
        }
    }

    async fn find_and_update_if(
        &self,
        id: &str,
        predicate: &LeasePredicate,
        update: &LeaseUpdate,
    ) -> Result<Option<UpdatedLease>, StoreError> {
        let body = ConditionalUpdateRequest {
            predicate: predicate.clone(),
            update: update.clone(),
        };
        let resp = self
            .send(
                self.client
                    .post(self.url(&[id, "update"]))
                    .json(&body),
            )
            .await?;
        match resp.status() {
            s if s.is_success() => Self::decode(resp).await,
            s => Err(status_error(s, id)),
        }
    }

    async fn delete_if(&self, id: &str, predicate: &LeasePredicate) -> Result<bool, StoreError> {
        let body = ConditionalDeleteRequest {
            predicate: predicate.clone(),
        };
        let resp = self
            .send(
                self.client
                    .post(self.url(&[id, "delete"]))
                    .json(&body),
            )
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(Self::decode::<DeleteResponse>(resp).await?.deleted),
            s => Err(status_error(s, id)),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<LeaseRecord>, StoreError> {
        let resp = self
            .send(self.client.get(self.url(&[id])))
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(Self::decode(resp).await?)),
            s => Err(status_error(s, id)),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let resp = self
            .send(
                self.client
                    .post(self.url(&["purge"]))
                    .json(&PurgeRequest { now }),
            )
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(Self::decode::<PurgeResponse>(resp).await?.purged),
            s => Err(status_error(s, "*")),
        }
    }
}
