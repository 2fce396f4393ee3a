//! Client for the coordinator API
//!
//! Every call carries the configured timeout; a timeout or refused
//! connection comes back as [`Error::AckTimeout`] / [`Error::DialFailure`]
//! and retrying is left to the caller.

use crate::common::types::{
    DeleteRequest, DeleteResponse, GetVersionsResponse, JoinAck, JoinRequest, LeaveAck,
    LeaveRequest, LsResponse, MemberList, PutAck, PutRequest, StoreResponse,
};
use crate::common::{base_url, Error, Node, Result, COORDINATOR_PORT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

#[derive(Clone)]
pub struct CoordinatorClient {
    http: reqwest::Client,
    base: String,
    timeout: Duration,
}

impl CoordinatorClient {
    pub fn new(coordinator: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base: base_url(coordinator, COORDINATOR_PORT),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub async fn join(&self, address: &str, port: Option<u16>) -> Result<Node> {
        let req = JoinRequest {
            address: address.to_string(),
            port,
        };
        let ack: JoinAck = self.post("/join", &req).await?;
        Ok(ack.node)
    }

    pub async fn leave(&self, address: &str) -> Result<bool> {
        let req = LeaveRequest {
            address: address.to_string(),
        };
        let ack: LeaveAck = self.post("/leave", &req).await?;
        Ok(ack.removed)
    }

    pub async fn put(&self, name: &str, source: &str) -> Result<PutAck> {
        let req = PutRequest {
            name: name.to_string(),
            source: source.to_string(),
        };
        self.post("/put", &req).await
    }

    pub async fn delete(&self, filename: &str) -> Result<bool> {
        let req = DeleteRequest {
            filename: filename.to_string(),
        };
        let resp: DeleteResponse = self.post("/delete", &req).await?;
        Ok(resp.existed)
    }

    pub async fn ls(&self, filename: &str) -> Result<Vec<String>> {
        let resp: LsResponse = self.get("/ls", &[("filename", filename)]).await?;
        Ok(resp.addresses)
    }

    pub async fn store(&self, address: &str) -> Result<Vec<String>> {
        let resp: StoreResponse = self.get("/store", &[("address", address)]).await?;
        Ok(resp.files)
    }

    pub async fn members(&self) -> Result<MemberList> {
        self.get::<MemberList, [(&str, &str); 0]>("/members", &[])
            .await
    }

    pub async fn versions(&self, filename: &str, count: usize) -> Result<Vec<String>> {
        let count = count.to_string();
        let resp: GetVersionsResponse = self
            .get("/versions", &[("filename", filename), ("count", count.as_str())])
            .await?;
        Ok(resp.versions)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let map_err = |e| Error::from_reqwest(&self.base, self.timeout, e);
        self.http
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await
            .map_err(map_err)?
            .error_for_status()
            .map_err(map_err)?
            .json()
            .await
            .map_err(map_err)
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let map_err = |e| Error::from_reqwest(&self.base, self.timeout, e);
        self.http
            .get(format!("{}{}", self.base, path))
            .query(query)
            .send()
            .await
            .map_err(map_err)?
            .error_for_status()
            .map_err(map_err)?
            .json()
            .await
            .map_err(map_err)
    }
}
