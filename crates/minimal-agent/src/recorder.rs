//! Run persistence seam.
//!
//! Only [`RunRecorder::create_request`] is load-bearing for the runner; the
//! other writes are best effort and their failures are logged by the caller.

use async_trait::async_trait;
use minimal_store::{NewRequest, NewResponse, NewStep, RunStore};
use serde_json::Value;

use crate::error::Result;

#[async_trait]
pub trait RunRecorder: Send + Sync {
    /// Returns the new request id.
    async fn create_request(&self, request: NewRequest) -> Result<String>;

    async fn create_step(&self, step: NewStep) -> Result<String>;

    async fn create_response(&self, response: NewResponse) -> Result<String>;

    async fn store_plan(&self, request_id: &str, plan: &Value) -> Result<String>;
}

#[async_trait]
impl RunRecorder for RunStore {
    async fn create_request(&self, request: NewRequest) -> Result<String> {
        Ok(RunStore::create_request(self, request).await?)
    }

    async fn create_step(&self, step: NewStep) -> Result<String> {
        Ok(RunStore::create_step(self, step).await?)
    }

    async fn create_response(&self, response: NewResponse) -> Result<String> {
        Ok(RunStore::create_response(self, response).await?)
    }

    async fn store_plan(&self, request_id: &str, plan: &Value) -> Result<String> {
        Ok(RunStore::store_plan(self, request_id, plan).await?)
    }
}
