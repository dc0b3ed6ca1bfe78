use crate::domain::model::{Dataset, Location, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(&self, path: &str, data: &[u8]) -> impl Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl Future<Output = bool> + Send;
}

/// Time source and sleeper for the rate limiter.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Provider 單次查詢失敗；對重試而言全部視為暫時性錯誤
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("request timed out")]
    Timeout,

    #[error("service returned HTTP {status}")]
    Service { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// One outbound address lookup.
///
/// `Ok(None)` is a valid answer with no match; it is not retried.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, address: &str) -> std::result::Result<Option<Location>, LookupError>;

    /// Name recorded in `geocode_source`.
    fn provider_name(&self) -> &str;
}

#[async_trait]
pub trait Pipeline: Send {
    async fn extract(&mut self) -> Result<Dataset>;
    async fn transform(&mut self, data: Dataset) -> Result<TransformResult>;
    async fn load(&mut self, result: &TransformResult) -> Result<Vec<String>>;
}
