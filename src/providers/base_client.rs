use crate::core::error::NoteaiError;
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;

/// Thin JSON-over-HTTP client shared by providers.
#[derive(Clone, Default)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// POSTs `payload` as JSON to `{endpoint}/{path}` with a bearer token.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        path: &str,
        bearer: &str,
        payload: &T,
    ) -> Result<Response, NoteaiError> {
        let url = format!("{}/{}", endpoint.trim_end_matches('/'), path);
        debug!(url = %url, "Sending request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        debug!(status = %response.status(), "Received response");
        Ok(response)
    }
}
