//! Time-limited access to private objects in the storage platform.
//!
//! Videos and thumbnails live in private buckets. Pages never see a permanent
//! URL: every view asks [`SignedUrlResolver`] for a fresh signed URL and falls
//! back to a placeholder when none comes back.

mod client;

use std::{fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{debug, warn};

use crate::error::SignError;

pub use client::StorageClient;

/// Closed set of storage areas the application writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Videos,
    Thumbnails,
}

impl Bucket {
    pub const fn as_str(self) -> &'static str {
        match self {
            Bucket::Videos => "videos",
            Bucket::Thumbnails => "thumbnails",
        }
    }

    /// 2 hours for video bytes, 24 hours for thumbnails.
    pub const fn default_ttl_secs(self) -> u64 {
        match self {
            Bucket::Videos => 7200,
            Bucket::Thumbnails => 86400,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer to a stored object as recorded by the upload flow. A `None` path
/// means the object was never uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub bucket: Bucket,
    pub path: Option<String>,
}

impl MediaRef {
    pub fn new(bucket: Bucket, path: Option<String>) -> Self {
        Self { bucket, path }
    }
}

/// A signed URL and the instant it stops working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedGrant {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// The storage platform's signing endpoint.
///
/// Implementations may block; the resolver always calls them from the blocking
/// pool.
pub trait UrlSigner: Send + Sync + 'static {
    fn create_signed_url(
        &self,
        bucket: Bucket,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, SignError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlTtls {
    pub video_secs: u64,
    pub thumbnail_secs: u64,
}

impl Default for UrlTtls {
    fn default() -> Self {
        Self {
            video_secs: Bucket::Videos.default_ttl_secs(),
            thumbnail_secs: Bucket::Thumbnails.default_ttl_secs(),
        }
    }
}

/// Cloneable front door to the signer. Holds no grant cache: each call mints
/// a new URL and callers decide whether to reuse it.
#[derive(Clone)]
pub struct SignedUrlResolver {
    signer: Arc<dyn UrlSigner>,
    ttls: UrlTtls,
}

impl SignedUrlResolver {
    pub fn new(signer: Arc<dyn UrlSigner>) -> Self {
        Self::with_ttls(signer, UrlTtls::default())
    }

    pub fn with_ttls(signer: Arc<dyn UrlSigner>, ttls: UrlTtls) -> Self {
        Self { signer, ttls }
    }

    pub fn ttls(&self) -> UrlTtls {
        self.ttls
    }

    /// Returns `None` without contacting storage when `path` is absent, and
    /// `None` (after logging) when signing fails. Never errors.
    pub async fn resolve(
        &self,
        bucket: Bucket,
        path: Option<&str>,
        ttl_secs: u64,
    ) -> Option<SignedGrant> {
        let path = path?;
        match self.try_resolve(bucket, path, ttl_secs).await {
            Ok(grant) => {
                debug!(%bucket, path, expires_at = %grant.expires_at, "minted signed URL");
                Some(grant)
            }
            Err(err) => {
                warn!(%bucket, path, error = %err, "creating signed URL failed");
                None
            }
        }
    }

    /// Resolves a [`MediaRef`] with the configured lifetime for its bucket.
    pub async fn resolve_ref(&self, media: &MediaRef) -> Option<SignedGrant> {
        let ttl = match media.bucket {
            Bucket::Videos => self.ttls.video_secs,
            Bucket::Thumbnails => self.ttls.thumbnail_secs,
        };
        self.resolve(media.bucket, media.path.as_deref(), ttl).await
    }

    /// Signs a video and its thumbnail at the same time. Each side succeeds or
    /// fails on its own.
    pub async fn resolve_pair(
        &self,
        video_path: Option<&str>,
        thumbnail_path: Option<&str>,
    ) -> (Option<SignedGrant>, Option<SignedGrant>) {
        tokio::join!(
            self.resolve(Bucket::Videos, video_path, self.ttls.video_secs),
            self.resolve(Bucket::Thumbnails, thumbnail_path, self.ttls.thumbnail_secs),
        )
    }

    async fn try_resolve(
        &self,
        bucket: Bucket,
        path: &str,
        ttl_secs: u64,
    ) -> Result<SignedGrant, SignError> {
        if ttl_secs == 0 {
            return Err(SignError::InvalidTtl);
        }
        let ttl = i64::try_from(ttl_secs).map_err(|_| SignError::InvalidTtl)?;
        let lifetime = Duration::try_seconds(ttl).ok_or(SignError::InvalidTtl)?;

        let issued_at = Utc::now();
        let signer = Arc::clone(&self.signer);
        let owned_path = path.to_owned();
        let url = task::spawn_blocking(move || {
            signer.create_signed_url(bucket, &owned_path, ttl_secs)
        })
        .await
        .map_err(|err| SignError::Join(err.to_string()))??;

        Ok(SignedGrant {
            url,
            expires_at: issued_at + lifetime,
        })
    }
}

/// Stand-in signer for deployments without object storage. Every request
/// fails, so pages render with their placeholders.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredSigner;

impl UrlSigner for UnconfiguredSigner {
    fn create_signed_url(&self, _: Bucket, _: &str, _: u64) -> Result<String, SignError> {
        Err(SignError::NotConfigured)
    }
}

/// Object key for a fresh upload: `{user_id}/{uploaded_at_ms}_{file_name}`.
/// Keys are namespaced per user so storage policies can scope writes.
pub fn object_path(user_id: &str, uploaded_at_ms: i64, file_name: &str) -> String {
    let file_name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    format!("{user_id}/{uploaded_at_ms}_{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::{Duration as StdDuration, Instant},
    };

    struct FakeSigner {
        calls: AtomicUsize,
        failing: Option<Bucket>,
        delay: StdDuration,
    }

    impl FakeSigner {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failing: None,
                delay: StdDuration::ZERO,
            }
        }

        fn failing(bucket: Bucket) -> Self {
            Self {
                failing: Some(bucket),
                ..Self::new()
            }
        }
    }

    impl UrlSigner for FakeSigner {
        fn create_signed_url(
            &self,
            bucket: Bucket,
            path: &str,
            expires_in_secs: u64,
        ) -> Result<String, SignError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if self.failing == Some(bucket) {
                return Err(SignError::Status {
                    status: 400,
                    message: "Object not found".into(),
                });
            }
            Ok(format!(
                "https://cdn.test/{bucket}/{path}?token=abc&ttl={expires_in_secs}"
            ))
        }
    }

    fn resolver(signer: &Arc<FakeSigner>) -> SignedUrlResolver {
        SignedUrlResolver::new(signer.clone())
    }

    #[tokio::test]
    async fn absent_path_never_contacts_storage() {
        let signer = Arc::new(FakeSigner::new());
        let resolver = resolver(&signer);
        assert!(resolver.resolve(Bucket::Videos, None, 7200).await.is_none());
        assert!(
            resolver
                .resolve_ref(&MediaRef::new(Bucket::Thumbnails, None))
                .await
                .is_none()
        );
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn grant_carries_backend_url_verbatim() {
        let signer = Arc::new(FakeSigner::new());
        let before = Utc::now();
        let grant = resolver(&signer)
            .resolve(Bucket::Videos, Some("u1/1700_clip.mp4"), 7200)
            .await
            .unwrap();
        assert_eq!(
            grant.url,
            "https://cdn.test/videos/u1/1700_clip.mp4?token=abc&ttl=7200"
        );
        assert!(grant.expires_at > before + Duration::seconds(7199));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_none() {
        let signer = Arc::new(FakeSigner::failing(Bucket::Videos));
        let grant = resolver(&signer)
            .resolve(Bucket::Videos, Some("u1/missing.mp4"), 7200)
            .await;
        assert!(grant.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_is_refused_locally() {
        let signer = Arc::new(FakeSigner::new());
        let grant = resolver(&signer)
            .resolve(Bucket::Thumbnails, Some("u1/t.png"), 0)
            .await;
        assert!(grant.is_none());
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pair_survives_video_failure() {
        let signer = Arc::new(FakeSigner::failing(Bucket::Videos));
        let (video, thumbnail) = resolver(&signer)
            .resolve_pair(Some("u1/v.mp4"), Some("u1/t.png"))
            .await;
        assert!(video.is_none());
        assert_eq!(
            thumbnail.unwrap().url,
            "https://cdn.test/thumbnails/u1/t.png?token=abc&ttl=86400"
        );
    }

    #[tokio::test]
    async fn pair_survives_thumbnail_failure() {
        let signer = Arc::new(FakeSigner::failing(Bucket::Thumbnails));
        let (video, thumbnail) = resolver(&signer)
            .resolve_pair(Some("u1/v.mp4"), Some("u1/t.png"))
            .await;
        assert!(video.is_some());
        assert!(thumbnail.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pair_signs_concurrently() {
        let signer = Arc::new(FakeSigner {
            delay: StdDuration::from_millis(300),
            ..FakeSigner::new()
        });
        let started = Instant::now();
        let (video, thumbnail) = resolver(&signer)
            .resolve_pair(Some("u1/v.mp4"), Some("u1/t.png"))
            .await;
        assert!(video.is_some() && thumbnail.is_some());
        assert!(started.elapsed() < StdDuration::from_millis(550));
    }

    #[tokio::test]
    async fn configured_ttls_apply_per_bucket() {
        let signer = Arc::new(FakeSigner::new());
        let resolver = SignedUrlResolver::with_ttls(
            signer.clone(),
            UrlTtls {
                video_secs: 60,
                thumbnail_secs: 120,
            },
        );
        let grant = resolver
            .resolve_ref(&MediaRef::new(Bucket::Thumbnails, Some("u1/t.png".into())))
            .await
            .unwrap();
        assert!(grant.url.ends_with("ttl=120"));
    }

    #[tokio::test]
    async fn unconfigured_storage_resolves_nothing() {
        let resolver = SignedUrlResolver::new(Arc::new(UnconfiguredSigner));
        let (video, thumb) = resolver.resolve_pair(Some("u/1_a.mp4"), Some("u/1_a.png")).await;
        assert!(video.is_none());
        assert!(thumb.is_none());
    }

    #[test]
    fn object_path_namespaces_by_user() {
        assert_eq!(
            object_path("user-1", 1_700_000_000_000, "holiday.mp4"),
            "user-1/1700000000000_holiday.mp4"
        );
        assert_eq!(
            object_path("user-1", 5, "C:\\clips\\cat.webm"),
            "user-1/5_cat.webm"
        );
    }
}
