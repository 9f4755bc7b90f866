//! Remote disk transport (§4.4): binary `PUT`/`GET /_internal/chunk` for
//! shard bytes, JSON-RPC (`storage.readXlMeta`/`storage.writeXlMeta`/
//! `storage.readChunk`/`storage.writeChunk`) for metadata and as a fallback
//! chunk path. The server side is an `axum` router over a `DiskOps`
//! implementation; the client side (`RemoteDisk`) is a `reqwest`-based
//! implementation of the same shape, so fan-out and the object pipeline
//! never need to know whether a shard landed locally or on the wire.
//!
//! `X-Object` carries the already-derived object path (§4.1), URL-encoded,
//! rather than the raw S3 key: both sides of the wire need to agree on
//! exactly the same relative directory, and the object path is that
//! agreement already computed once by the caller.

use crate::disk::LocalDisk;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strata_common::{Error, Result};

const HDR_BUCKET: &str = "x-bucket";
const HDR_OBJECT: &str = "x-object";
const HDR_CHUNK_INDEX: &str = "x-chunk-index";
const HDR_DISK_PATH: &str = "x-disk-path";

/// Sockets use a 5-minute timeout to tolerate large shards, and
/// `TCP_NODELAY` (set by `reqwest`/`hyper` defaults) for low per-request
/// latency (§4.4).
const SOCKET_TIMEOUT: Duration = Duration::from_secs(300);

fn url_encode(s: &str) -> String {
    percent_encode(s)
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ---------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------

/// Server-side state: the set of local disks this node exposes, keyed by
/// disk path (`X-Disk-Path`).
#[derive(Clone)]
pub struct TransportState {
    disks: Arc<std::collections::HashMap<String, Arc<LocalDisk>>>,
}

impl TransportState {
    #[must_use]
    pub fn new(disks: std::collections::HashMap<String, Arc<LocalDisk>>) -> Self {
        Self {
            disks: Arc::new(disks),
        }
    }

    fn disk(&self, disk_path: &str) -> Option<Arc<LocalDisk>> {
        self.disks.get(disk_path).cloned()
    }
}

#[must_use]
pub fn router(state: TransportState) -> Router {
    Router::new()
        .route(
            "/_internal/chunk",
            put(put_chunk).get(get_chunk).delete(delete_chunk),
        )
        .route("/_internal/rpc", post(rpc))
        .with_state(state)
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::invalid_arg(format!("missing header {name}")))
}

fn object_path_from_headers(headers: &HeaderMap) -> Result<String> {
    let encoded = required_header(headers, HDR_OBJECT)?;
    Ok(percent_decode(encoded))
}

fn disk_from_headers(state: &TransportState, headers: &HeaderMap) -> Result<Arc<LocalDisk>> {
    let encoded = required_header(headers, HDR_DISK_PATH)?;
    let disk_path = percent_decode(encoded);
    state
        .disk(&disk_path)
        .ok_or_else(|| Error::not_found(format!("no such disk {disk_path}")))
}

fn chunk_index_from_headers(headers: &HeaderMap) -> Result<u32> {
    required_header(headers, HDR_CHUNK_INDEX)?
        .parse()
        .map_err(|_| Error::invalid_arg("invalid X-Chunk-Index"))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArg(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

async fn put_chunk(
    State(state): State<TransportState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<StatusCode, Error> {
    let _bucket = headers.get(HDR_BUCKET); // present for wire compatibility, unused server-side
    let object_path = object_path_from_headers(&headers)?;
    let index = chunk_index_from_headers(&headers)?;
    let disk = disk_from_headers(&state, &headers)?;
    tokio::task::spawn_blocking(move || disk.write_chunk(&object_path, index, &body))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;
    Ok(StatusCode::OK)
}

async fn get_chunk(
    State(state): State<TransportState>,
    headers: HeaderMap,
) -> std::result::Result<Bytes, Error> {
    let object_path = object_path_from_headers(&headers)?;
    let index = chunk_index_from_headers(&headers)?;
    let disk = disk_from_headers(&state, &headers)?;
    let bytes = tokio::task::spawn_blocking(move || disk.read_chunk(&object_path, index))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;
    Ok(Bytes::from(bytes))
}

async fn delete_chunk(
    State(state): State<TransportState>,
    headers: HeaderMap,
) -> std::result::Result<StatusCode, Error> {
    let object_path = object_path_from_headers(&headers)?;
    let index = chunk_index_from_headers(&headers)?;
    let disk = disk_from_headers(&state, &headers)?;
    tokio::task::spawn_blocking(move || disk.delete_chunk(&object_path, index))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct RpcRequest {
    method: String,
    params: RpcParams,
}

#[derive(Deserialize)]
struct RpcParams {
    object: String,
    disk_path: String,
    #[serde(default)]
    chunk_index: Option<u32>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Serialize)]
struct RpcResponse {
    error_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
}

impl RpcResponse {
    fn ok(result: Option<String>) -> Self {
        Self {
            error_code: 0,
            error_message: None,
            result,
        }
    }

    fn err(e: &Error) -> Self {
        Self {
            error_code: 1,
            error_message: Some(e.to_string()),
            result: None,
        }
    }
}

async fn rpc(State(state): State<TransportState>, Json(req): Json<RpcRequest>) -> Json<RpcResponse> {
    let result = handle_rpc(&state, req).await;
    Json(match result {
        Ok(r) => RpcResponse::ok(r),
        Err(e) => RpcResponse::err(&e),
    })
}

async fn handle_rpc(state: &TransportState, req: RpcRequest) -> Result<Option<String>> {
    let disk = state
        .disk(&req.params.disk_path)
        .ok_or_else(|| Error::not_found(format!("no such disk {}", req.params.disk_path)))?;
    let object_path = req.params.object.clone();
    match req.method.as_str() {
        "storage.readXlMeta" => {
            let bytes = tokio::task::spawn_blocking(move || disk.read_xl_meta(&object_path))
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))??;
            Ok(Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                bytes,
            )))
        }
        "storage.writeXlMeta" => {
            let data = req
                .params
                .data
                .ok_or_else(|| Error::invalid_arg("missing data"))?;
            let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data)
                .map_err(|e| Error::invalid_arg(format!("invalid base64: {e}")))?;
            tokio::task::spawn_blocking(move || disk.write_xl_meta(&object_path, &bytes))
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))??;
            Ok(None)
        }
        "storage.readChunk" => {
            let index = req
                .params
                .chunk_index
                .ok_or_else(|| Error::invalid_arg("missing chunk_index"))?;
            let bytes =
                tokio::task::spawn_blocking(move || disk.read_chunk(&object_path, index))
                    .await
                    .map_err(|e| Error::Io(std::io::Error::other(e)))??;
            Ok(Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                bytes,
            )))
        }
        "storage.writeChunk" => {
            let index = req
                .params
                .chunk_index
                .ok_or_else(|| Error::invalid_arg("missing chunk_index"))?;
            let data = req
                .params
                .data
                .ok_or_else(|| Error::invalid_arg("missing data"))?;
            let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data)
                .map_err(|e| Error::invalid_arg(format!("invalid base64: {e}")))?;
            tokio::task::spawn_blocking(move || disk.write_chunk(&object_path, index, &bytes))
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))??;
            Ok(None)
        }
        "storage.deleteXlMeta" => {
            tokio::task::spawn_blocking(move || disk.delete_xl_meta(&object_path))
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))??;
            Ok(None)
        }
        other => Err(Error::invalid_arg(format!("unknown rpc method {other}"))),
    }
}

// ---------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------

/// A disk reached over the wire. `base_url` is `http://host:port`;
/// `disk_path` identifies which of that node's disks this handle targets.
pub struct RemoteDisk {
    client: reqwest::Client,
    base_url: String,
    disk_path: String,
}

impl RemoteDisk {
    #[must_use]
    pub fn new(network_address: &str, disk_path: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SOCKET_TIMEOUT)
            .tcp_nodelay(true)
            .build()
            .expect("reqwest client with sane defaults");
        Self {
            client,
            base_url: format!("http://{network_address}"),
            disk_path: disk_path.into(),
        }
    }

    fn chunk_headers(&self, object_path: &str, index: u32) -> Vec<(&'static str, String)> {
        vec![
            (HDR_BUCKET, String::new()),
            (HDR_OBJECT, url_encode(object_path)),
            (HDR_CHUNK_INDEX, index.to_string()),
            (HDR_DISK_PATH, url_encode(&self.disk_path)),
        ]
    }

    pub async fn write_chunk(&self, object_path: &str, index: u32, bytes: Vec<u8>) -> Result<()> {
        let mut req = self
            .client
            .put(format!("{}/_internal/chunk", self.base_url));
        for (k, v) in self.chunk_headers(object_path, index) {
            req = req.header(k, v);
        }
        let resp = req
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::Rpc(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Rpc(format!("chunk put failed: {}", resp.status())));
        }
        Ok(())
    }

    pub async fn read_chunk(&self, object_path: &str, index: u32) -> Result<Vec<u8>> {
        let mut req = self
            .client
            .get(format!("{}/_internal/chunk", self.base_url));
        for (k, v) in self.chunk_headers(object_path, index) {
            req = req.header(k, v);
        }
        let resp = req.send().await.map_err(|e| Error::Rpc(e.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found(format!("chunk {index} at {object_path}")));
        }
        if !resp.status().is_success() {
            return Err(Error::Rpc(format!("chunk get failed: {}", resp.status())));
        }
        Ok(resp.bytes().await.map_err(|e| Error::Rpc(e.to_string()))?.to_vec())
    }

    pub async fn delete_chunk(&self, object_path: &str, index: u32) -> Result<()> {
        let mut req = self
            .client
            .delete(format!("{}/_internal/chunk", self.base_url));
        for (k, v) in self.chunk_headers(object_path, index) {
            req = req.header(k, v);
        }
        let resp = req.send().await.map_err(|e| Error::Rpc(e.to_string()))?;
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            return Err(Error::Rpc(format!("chunk delete failed: {}", resp.status())));
        }
        Ok(())
    }

    async fn call_rpc(&self, method: &str, params: serde_json::Value) -> Result<Option<String>> {
        #[derive(Serialize)]
        struct Req<'a> {
            method: &'a str,
            params: serde_json::Value,
        }
        let resp = self
            .client
            .post(format!("{}/_internal/rpc", self.base_url))
            .json(&Req { method, params })
            .send()
            .await
            .map_err(|e| Error::Rpc(e.to_string()))?;
        let body: RpcResponseClient = resp.json().await.map_err(|e| Error::Rpc(e.to_string()))?;
        if body.error_code != 0 {
            let msg = body.error_message.unwrap_or_default();
            if msg.contains("not found") {
                return Err(Error::not_found(msg));
            }
            return Err(Error::Rpc(msg));
        }
        Ok(body.result)
    }

    pub async fn write_xl_meta(&self, object_path: &str, bytes: Vec<u8>) -> Result<()> {
        let data = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
        self.call_rpc(
            "storage.writeXlMeta",
            serde_json::json!({"object": object_path, "disk_path": self.disk_path, "data": data}),
        )
        .await?;
        Ok(())
    }

    pub async fn read_xl_meta(&self, object_path: &str) -> Result<Vec<u8>> {
        let result = self
            .call_rpc(
                "storage.readXlMeta",
                serde_json::json!({"object": object_path, "disk_path": self.disk_path}),
            )
            .await?
            .ok_or_else(|| Error::Rpc("readXlMeta returned no result".to_string()))?;
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, result)
            .map_err(|e| Error::Rpc(format!("invalid base64 in rpc result: {e}")))
    }

    pub async fn delete_xl_meta(&self, object_path: &str) -> Result<()> {
        self.call_rpc(
            "storage.deleteXlMeta",
            serde_json::json!({"object": object_path, "disk_path": self.disk_path}),
        )
        .await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct RpcResponseClient {
    error_code: i32,
    error_message: Option<String>,
    result: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_roundtrip() {
        let s = "aa/abcdef0123456789/versions/v1";
        assert_eq!(percent_decode(&percent_encode(s)), s);
    }

    #[test]
    fn test_percent_encode_escapes_slash() {
        assert_eq!(percent_encode("a/b"), "a%2Fb");
    }
}
