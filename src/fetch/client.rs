use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a prepared request against an open-data endpoint.
///
/// The loaders only depend on this trait, so a deployment can wrap
/// [`super::BasicClient`] without touching the pipeline.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
