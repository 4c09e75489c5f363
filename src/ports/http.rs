//! HTTP abstraction returning a lightweight fetch result.

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: Option<u16>,
    pub body: Option<Vec<u8>>,
    pub error: Option<String>,
    pub latency_ms: u64,
}

#[async_trait::async_trait]
pub trait Http: Send + Sync {
    async fn get(&self, url: &str) -> FetchResponse;
}
