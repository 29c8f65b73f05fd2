use std::time::Duration;

use serde::Deserialize;

use super::{Bucket, UrlSigner};
use crate::error::SignError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking client for the storage platform's REST signing endpoint.
pub struct StorageClient {
    agent: ureq::Agent,
    base_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl StorageClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    fn storage_root(&self) -> String {
        format!("{}/storage/v1", self.base_url)
    }

    /// The platform answers with a path relative to the storage root; absolute
    /// URLs are passed through untouched.
    fn absolutize(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            format!("{}/{}", self.storage_root(), signed.trim_start_matches('/'))
        }
    }
}

impl UrlSigner for StorageClient {
    fn create_signed_url(
        &self,
        bucket: Bucket,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, SignError> {
        let url = format!(
            "{}/object/sign/{}/{}",
            self.storage_root(),
            bucket.as_str(),
            path.trim_start_matches('/')
        );

        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.service_key))
            .set("apikey", &self.service_key)
            .send_json(serde_json::json!({ "expiresIn": expires_in_secs }));

        match response {
            Ok(response) => {
                let body: SignResponse = response
                    .into_json()
                    .map_err(|err| SignError::Malformed(err.to_string()))?;
                Ok(self.absolutize(&body.signed_url))
            }
            Err(ureq::Error::Status(status, response)) => Err(SignError::Status {
                status,
                message: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => {
                Err(SignError::Transport(transport.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SignedUrlResolver;
    use axum::{
        Json, Router,
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use std::sync::Arc;

    async fn sign(
        Path((bucket, path)): Path<(String, String)>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some("service-key") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        if path.contains("missing") {
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(Json(serde_json::json!({
            "signedURL": format!("/object/sign/{bucket}/{path}?token=t{}", body["expiresIn"]),
        })))
    }

    async fn spawn_storage() -> String {
        let app = Router::new().route("/storage/v1/object/sign/{bucket}/{*path}", post(sign));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn absolute_urls_pass_through() {
        let client = StorageClient::new("https://proj.example/", "k");
        assert_eq!(
            client.absolutize("https://cdn.example/x"),
            "https://cdn.example/x"
        );
        assert_eq!(
            client.absolutize("/object/sign/videos/a.mp4?token=1"),
            "https://proj.example/storage/v1/object/sign/videos/a.mp4?token=1"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn signs_against_rest_endpoint() {
        let base = spawn_storage().await;
        let resolver =
            SignedUrlResolver::new(Arc::new(StorageClient::new(base.clone(), "service-key")));

        let grant = resolver
            .resolve(Bucket::Videos, Some("u1/1_clip.mp4"), 7200)
            .await
            .unwrap();
        assert_eq!(
            grant.url,
            format!("{base}/storage/v1/object/sign/videos/u1/1_clip.mp4?token=t7200")
        );

        let (video, thumbnail) = resolver
            .resolve_pair(Some("u1/missing.mp4"), Some("u1/1_thumb.png"))
            .await;
        assert!(video.is_none());
        assert!(thumbnail.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rejected_key_surfaces_status() {
        let base = spawn_storage().await;
        let client = StorageClient::new(base, "wrong");
        let result = tokio::task::spawn_blocking(move || {
            client.create_signed_url(Bucket::Thumbnails, "u1/t.png", 60)
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(SignError::Status { status: 401, .. })));
    }
}
