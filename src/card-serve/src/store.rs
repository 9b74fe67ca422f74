use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use log::debug;

use crate::config::normalize_prefix;
use crate::error::{Error, Result};
use crate::labels::PredictionResult;
use crate::normalize::NormalizedImage;

pub const IMAGE_OBJECT: &str = "image.png";
pub const RESULT_OBJECT: &str = "results.json";

/// Somewhere to drop per-request artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fail early when the store cannot accept writes at all
    fn check(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;
}

/// Key prefix shared by all artifacts of one request
pub fn artifact_prefix(prefix: &str, request_id: &str) -> String {
    format!("{}aws_request_id_{}/", normalize_prefix(prefix), request_id)
}

/// Write the normalized image, then the prediction. A failure on the second
/// write leaves the image in place.
pub async fn persist(
    store: &dyn ArtifactStore,
    prefix: &str,
    request_id: &str,
    image: &NormalizedImage,
    result: &PredictionResult,
) -> Result<()> {
    let base = artifact_prefix(prefix, request_id);

    store
        .put(
            &format!("{}{}", base, IMAGE_OBJECT),
            image.png().to_vec(),
            "image/png",
        )
        .await?;

    let json = serde_json::to_vec(result)
        .map_err(|e| Error::Storage(format!("could not serialize result: {}", e)))?;

    store
        .put(
            &format!("{}{}", base, RESULT_OBJECT),
            json,
            "application/json",
        )
        .await
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: Option<String>,
}

impl S3Store {
    pub fn new(sdk_config: &aws_config::SdkConfig, bucket: Option<String>) -> Self {
        S3Store {
            client: aws_sdk_s3::Client::new(sdk_config),
            bucket,
        }
    }

    fn bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| Error::Configuration("BUCKET_NAME is not set".to_owned()))
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    fn check(&self) -> Result<()> {
        self.bucket().map(|_| ())
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let bucket = self.bucket()?;

        debug!("Uploading s3://{}/{} ({} bytes)", bucket, key, body.len());

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!("s3://{}/{}: {}", bucket, key, DisplayErrorContext(&e)))
            })?;

        Ok(())
    }
}

/// Artifacts as plain files under a root directory
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let path = self.root.join(key);
        debug!("Writing {} ({})", path.display(), content_type);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("{}: {}", parent.display(), e)))?;
        }

        tokio::fs::write(&path, body)
            .await
            .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_bytes;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn image() -> NormalizedImage {
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])))
            .write_to(&mut Cursor::new(&mut data), ImageOutputFormat::Png)
            .unwrap();
        normalize_bytes(&data).unwrap()
    }

    fn result() -> PredictionResult {
        PredictionResult {
            label: "joker".to_owned(),
            confidence: 0.5,
        }
    }

    #[test]
    fn keys_are_namespaced_by_request() {
        assert_eq!(
            artifact_prefix("raw_data/", "abc-123"),
            "raw_data/aws_request_id_abc-123/"
        );
        assert_eq!(
            artifact_prefix("raw_data", "abc-123"),
            "raw_data/aws_request_id_abc-123/"
        );
        assert_eq!(artifact_prefix("", "x"), "aws_request_id_x/");
    }

    #[tokio::test]
    async fn local_store_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        persist(&store, "raw_data/", "req-7", &image(), &result())
            .await
            .unwrap();

        let base = dir.path().join("raw_data").join("aws_request_id_req-7");
        let png = std::fs::read(base.join("image.png")).unwrap();
        assert_eq!(
            image::load_from_memory(&png).unwrap().to_rgb8().dimensions(),
            (224, 224)
        );

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(base.join("results.json")).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"label": "joker", "confidence": 0.5}));
    }

    #[tokio::test]
    async fn unwritable_root_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = LocalStore::new(&blocker);
        let err = store
            .put("raw_data/a/image.png", vec![1], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn s3_store_without_bucket_is_a_configuration_error() {
        let sdk_config = aws_config::SdkConfig::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build();
        let store = S3Store::new(&sdk_config, None);

        let err = store
            .put("raw_data/a/image.png", vec![1], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("BUCKET_NAME"));
        assert!(matches!(store.check(), Err(Error::Configuration(_))));

        let configured = S3Store::new(&sdk_config, Some("cards".to_owned()));
        assert!(configured.check().is_ok());
    }
}
