//! JSON-RPC transport to the aria2 daemon

use crate::rpc::models::{Aria2Snapshot, Aria2Status};
use crate::utils::error::HaulError;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Raw aria2 control surface.
///
/// Kept object-safe so the orchestrator can hold an `Arc<dyn Aria2Api>` and tests can swap in a
/// recording mock.
#[async_trait]
pub trait Aria2Api: Send + Sync {
    /// `aria2.addUri`; returns the new gid
    async fn add_uri(&self, uris: Vec<String>, options: Option<Value>) -> Result<String>;

    async fn pause(&self, gid: &str) -> Result<String>;

    async fn unpause(&self, gid: &str) -> Result<String>;

    async fn remove(&self, gid: &str) -> Result<String>;

    /// `aria2.removeDownloadResult`, clears a stopped download from memory
    async fn remove_download_result(&self, gid: &str) -> Result<String>;

    async fn tell_status(&self, gid: &str) -> Result<Aria2Status>;

    async fn tell_active(&self) -> Result<Vec<Aria2Status>>;

    async fn tell_waiting(&self, offset: usize, count: usize) -> Result<Vec<Aria2Status>>;

    async fn tell_stopped(&self, offset: usize, count: usize) -> Result<Vec<Aria2Status>>;

    /// Active, waiting and stopped downloads in one snapshot, the latter two capped at `limit`
    async fn tell_all(&self, limit: usize) -> Result<Aria2Snapshot> {
        Ok(Aria2Snapshot {
            active: self.tell_active().await?,
            waiting: self.tell_waiting(0, limit).await?,
            stopped: self.tell_stopped(0, limit).await?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// HTTP JSON-RPC client for aria2
pub struct Aria2Client {
    http: Client,
    endpoint: String,
    secret: Option<String>,
    next_id: AtomicU64,
}

impl Aria2Client {
    pub fn new(endpoint: impl Into<String>, secret: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            secret,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Prepend `token:<secret>` when the daemon is protected
    fn with_token(&self, mut params: Vec<Value>) -> Vec<Value> {
        if let Some(secret) = &self.secret {
            params.insert(0, Value::String(format!("token:{}", secret)));
        }
        params
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id.to_string(),
            "method": method,
            "params": self.with_token(params),
        });

        debug!("aria2 call {} (id {})", method, id);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        // aria2 answers RPC faults with a 4xx status and a JSON-RPC error body
        let payload: RpcResponse = response.json().await.map_err(classify_transport_error)?;

        if let Some(err) = payload.error {
            warn!("aria2 {} failed: {} ({})", method, err.message, err.code);
            return Err(HaulError::Rpc {
                code: err.code,
                message: err.message,
            }
            .into());
        }

        payload.result.ok_or_else(|| {
            HaulError::Rpc {
                code: -1,
                message: format!("{} returned neither result nor error", method),
            }
            .into()
        })
    }

    async fn call_string(&self, method: &str, params: Vec<Value>) -> Result<String> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value).map_err(HaulError::from)?)
    }

    async fn call_list(&self, method: &str, params: Vec<Value>) -> Result<Vec<Aria2Status>> {
        let value = self.call(method, params).await?;
        Ok(serde_json::from_value(value).map_err(HaulError::from)?)
    }
}

fn classify_transport_error(e: reqwest::Error) -> anyhow::Error {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        HaulError::EngineUnavailable(e.to_string()).into()
    } else {
        HaulError::NetworkError(e).into()
    }
}

/// Unwrap one `system.multicall` entry: `[value]` on success, a fault struct otherwise
fn multicall_entry(entry: Value) -> Result<Vec<Aria2Status>> {
    match entry {
        Value::Array(mut items) if !items.is_empty() => {
            let value = items.swap_remove(0);
            Ok(serde_json::from_value(value).map_err(HaulError::from)?)
        }
        Value::Object(fault) => {
            let code = fault
                .get("code")
                .or_else(|| fault.get("faultCode"))
                .and_then(Value::as_i64)
                .unwrap_or(-1);
            let message = fault
                .get("message")
                .or_else(|| fault.get("faultString"))
                .and_then(Value::as_str)
                .unwrap_or("unknown fault")
                .to_string();
            Err(HaulError::Rpc { code, message }.into())
        }
        other => Err(HaulError::Rpc {
            code: -1,
            message: format!("unexpected multicall entry: {}", other),
        }
        .into()),
    }
}

#[async_trait]
impl Aria2Api for Aria2Client {
    async fn add_uri(&self, uris: Vec<String>, options: Option<Value>) -> Result<String> {
        let mut params = vec![json!(uris)];
        if let Some(options) = options {
            params.push(options);
        }
        self.call_string("aria2.addUri", params).await
    }

    async fn pause(&self, gid: &str) -> Result<String> {
        self.call_string("aria2.pause", vec![json!(gid)]).await
    }

    async fn unpause(&self, gid: &str) -> Result<String> {
        self.call_string("aria2.unpause", vec![json!(gid)]).await
    }

    async fn remove(&self, gid: &str) -> Result<String> {
        self.call_string("aria2.remove", vec![json!(gid)]).await
    }

    async fn remove_download_result(&self, gid: &str) -> Result<String> {
        self.call_string("aria2.removeDownloadResult", vec![json!(gid)])
            .await
    }

    async fn tell_status(&self, gid: &str) -> Result<Aria2Status> {
        let value = self.call("aria2.tellStatus", vec![json!(gid)]).await?;
        Ok(serde_json::from_value(value).map_err(HaulError::from)?)
    }

    async fn tell_active(&self) -> Result<Vec<Aria2Status>> {
        self.call_list("aria2.tellActive", vec![]).await
    }

    async fn tell_waiting(&self, offset: usize, count: usize) -> Result<Vec<Aria2Status>> {
        self.call_list("aria2.tellWaiting", vec![json!(offset), json!(count)])
            .await
    }

    async fn tell_stopped(&self, offset: usize, count: usize) -> Result<Vec<Aria2Status>> {
        self.call_list("aria2.tellStopped", vec![json!(offset), json!(count)])
            .await
    }

    /// Single `system.multicall` round trip
    async fn tell_all(&self, limit: usize) -> Result<Aria2Snapshot> {
        let calls = json!([
            {"methodName": "aria2.tellActive", "params": self.with_token(vec![])},
            {"methodName": "aria2.tellWaiting", "params": self.with_token(vec![json!(0), json!(limit)])},
            {"methodName": "aria2.tellStopped", "params": self.with_token(vec![json!(0), json!(limit)])},
        ]);

        // system.multicall itself takes no token
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id.to_string(),
            "method": "system.multicall",
            "params": [calls],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;
        let payload: RpcResponse = response.json().await.map_err(classify_transport_error)?;

        if let Some(err) = payload.error {
            return Err(HaulError::Rpc {
                code: err.code,
                message: err.message,
            }
            .into());
        }

        let entries: Vec<Value> = match payload.result {
            Some(Value::Array(entries)) if entries.len() == 3 => entries,
            other => {
                return Err(HaulError::Rpc {
                    code: -1,
                    message: format!("unexpected multicall result: {:?}", other),
                }
                .into())
            }
        };

        let mut entries = entries.into_iter();
        let mut next = || multicall_entry(entries.next().unwrap_or(Value::Null));

        Ok(Aria2Snapshot {
            active: next()?,
            waiting: next()?,
            stopped: next()?,
        })
    }
}
