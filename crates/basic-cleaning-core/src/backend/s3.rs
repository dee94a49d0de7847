//! S3-compatible backend. Every key is stored under an optional prefix so
//! several registries can share one bucket.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::{BackendError, ObjectBackend};

pub const BUCKET_VAR: &str = "S3_BUCKET";
pub const REGION_VAR: &str = "S3_REGION";
pub const ENDPOINT_VAR: &str = "S3_ENDPOINT_URL";
pub const ACCESS_KEY_VAR: &str = "S3_ACCESS_KEY_ID";
pub const SECRET_KEY_VAR: &str = "S3_SECRET_ACCESS_KEY";
pub const PATH_STYLE_VAR: &str = "S3_FORCE_PATH_STYLE";
pub const KEY_PREFIX_VAR: &str = "S3_KEY_PREFIX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
    pub key_prefix: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "basic-cleaning-artifacts".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
            key_prefix: None,
        }
    }
}

impl S3Config {
    /// Reads the `S3_*` variables through `get`. Only the bucket is required.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, BackendError> {
        let defaults = Self::default();
        let bucket = get(BUCKET_VAR).ok_or_else(|| {
            BackendError::Configuration(format!("{BUCKET_VAR} must be set for the s3 store"))
        })?;

        let force_path_style = match get(PATH_STYLE_VAR) {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                BackendError::Configuration(format!(
                    "{PATH_STYLE_VAR} must be true or false, got '{value}'"
                ))
            })?,
            None => defaults.force_path_style,
        };

        let key_prefix = get(KEY_PREFIX_VAR)
            .map(|prefix| prefix.trim_matches('/').to_string())
            .filter(|prefix| !prefix.is_empty());

        Ok(Self {
            bucket,
            region: get(REGION_VAR).unwrap_or(defaults.region),
            endpoint: get(ENDPOINT_VAR),
            access_key_id: get(ACCESS_KEY_VAR),
            secret_access_key: get(SECRET_KEY_VAR),
            force_path_style,
            key_prefix,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
    key_prefix: Option<String>,
}

impl S3Backend {
    pub async fn new(config: S3Config) -> Result<Self, BackendError> {
        if config.bucket.trim().is_empty() {
            return Err(BackendError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "basic-cleaning");
                loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
            }
            (None, None) => {}
            _ => {
                return Err(BackendError::Configuration(format!(
                    "{ACCESS_KEY_VAR} and {SECRET_KEY_VAR} must be set together"
                )))
            }
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(bucket = %config.bucket, prefix = ?config.key_prefix, "Configured S3 backend");
        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
            key_prefix: config.key_prefix,
        })
    }

    fn object_key(&self, key: &str) -> String {
        prefixed_key(self.key_prefix.as_deref(), key)
    }
}

fn prefixed_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}/{key}"),
        None => key.to_string(),
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BackendError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| BackendError::from_sdk(DisplayErrorContext(&err)))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BackendError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    BackendError::NotFound(key.to_string())
                } else {
                    BackendError::from_sdk(DisplayErrorContext(&err))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|err| BackendError::from_sdk(DisplayErrorContext(&err)))?;
        Ok(data.into_bytes())
    }

    fn describe(&self) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("s3://{}/{prefix}", self.bucket),
            None => format!("s3://{}", self.bucket),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn bucket_is_required() {
        let err = S3Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
    }

    #[test]
    fn lookup_fills_defaults_and_trims_prefix() {
        let config = S3Config::from_lookup(lookup(&[
            (BUCKET_VAR, "listings"),
            (ENDPOINT_VAR, "http://localhost:9000"),
            (PATH_STYLE_VAR, "TRUE"),
            (KEY_PREFIX_VAR, "/nyc/registry/"),
        ]))
        .unwrap();

        assert_eq!(config.bucket, "listings");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.force_path_style);
        assert_eq!(config.key_prefix.as_deref(), Some("nyc/registry"));
    }

    #[test]
    fn bad_path_style_flag_is_rejected() {
        let err =
            S3Config::from_lookup(lookup(&[(BUCKET_VAR, "b"), (PATH_STYLE_VAR, "maybe")]))
                .unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
    }

    #[test]
    fn keys_nest_under_prefix() {
        assert_eq!(prefixed_key(None, "x/latest"), "x/latest");
        assert_eq!(prefixed_key(Some("nyc"), "x/latest"), "nyc/x/latest");
    }

    #[tokio::test]
    async fn half_configured_credentials_are_rejected() {
        let config = S3Config {
            access_key_id: Some("key".into()),
            ..S3Config::default()
        };
        let err = S3Backend::new(config).await.err().expect("config error");
        assert!(matches!(err, BackendError::Configuration(_)));
    }
}
