//! AWS S3 link issuer.
//!
//! Signs `GetObject` requests for objects in a single configured bucket
//! using the SDK's presigning support.  No network call is made when a
//! link is issued; the signature is computed locally by the SDK from the
//! resolved credentials, and S3 verifies it when the client follows the
//! link.
//!
//! Credentials are resolved via the standard AWS credential chain
//! (env vars, `~/.aws/credentials`, IAM role, etc.) once at startup; a
//! chain that yields nothing, or a missing region, aborts construction.

use std::future::Future;
use std::pin::Pin;

use aws_config::SdkConfig;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use super::backend::{LinkIssuer, SignedLink, SigningError, LINK_TTL};
use crate::config::StorageConfig;

/// Link issuer that presigns S3 `GetObject` requests.
pub struct S3LinkIssuer {
    /// AWS S3 SDK client.
    client: Client,
    /// The bucket holding the audio objects.
    bucket: String,
}

impl S3LinkIssuer {
    /// Create a new issuer from the storage configuration.
    ///
    /// Loads AWS credentials from the default credential chain and
    /// initializes the S3 client for the configured region, honouring a
    /// custom endpoint (MinIO, LocalStack) and path-style addressing.
    pub async fn new(config: &StorageConfig) -> Result<Self, SigningError> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(ref region) = config.region {
            config_loader = config_loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(ref endpoint) = config.endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let sdk_config = config_loader.load().await;
        let region = ensure_signing_ready(&sdk_config).await?;

        let s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.use_path_style);

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "S3 link issuer initialized: bucket={} region={}",
            config.bucket, region
        );

        Ok(Self::from_client(client, config.bucket.clone()))
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

/// Check that `sdk_config` can sign: a region is set and the credential
/// provider yields credentials.  Returns the region name.
async fn ensure_signing_ready(sdk_config: &SdkConfig) -> Result<String, SigningError> {
    let region = sdk_config
        .region()
        .map(|r| r.to_string())
        .ok_or_else(|| SigningError::Config("no AWS region configured".to_string()))?;

    let provider = sdk_config.credentials_provider().ok_or_else(|| {
        SigningError::Config("no AWS credentials provider configured".to_string())
    })?;

    provider
        .provide_credentials()
        .await
        .map_err(|e| SigningError::Config(format!("AWS credentials unavailable: {}", e)))?;

    Ok(region)
}

impl LinkIssuer for S3LinkIssuer {
    fn issue(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<SignedLink, SigningError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            if key.is_empty() {
                return Err(SigningError::EmptyKey);
            }

            let presign_config = PresigningConfig::expires_in(LINK_TTL)
                .map_err(|e| SigningError::Config(e.to_string()))?;

            debug!("S3 presign get_object: bucket={} key={}", self.bucket, key);

            let presigned = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .presigned(presign_config)
                .await
                .map_err(|e| SigningError::Provider {
                    key: key.clone(),
                    message: e.to_string(),
                })?;

            Ok(SignedLink {
                url: presigned.uri().to_string(),
                key,
                expires_in: LINK_TTL,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::provider::error::CredentialsError;
    use aws_credential_types::provider::{future, SharedCredentialsProvider};
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

    fn test_issuer() -> S3LinkIssuer {
        let credentials = Credentials::new("AKIDEXAMPLE", "secret", None, None, "test");
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .build();
        S3LinkIssuer::from_client(Client::from_conf(config), "tracks-bucket".to_string())
    }

    #[tokio::test]
    async fn test_issue_is_scoped_to_key_and_read() {
        let issuer = test_issuer();
        let link = issuer.issue("albums/one/a.mp3").await.unwrap();

        assert_eq!(link.key, "albums/one/a.mp3");
        assert_eq!(link.expires_in, LINK_TTL);
        assert!(link.url.starts_with("https://"), "{}", link.url);
        assert!(link.url.contains("tracks-bucket"), "{}", link.url);
        assert!(link.url.contains("/albums/one/a.mp3?"), "{}", link.url);
        assert!(link.url.contains("X-Amz-Expires=60"), "{}", link.url);
        assert!(link.url.contains("X-Amz-Signature="), "{}", link.url);
        assert!(link.url.contains("X-Amz-Credential=AKIDEXAMPLE"), "{}", link.url);
        // A GET presign carries no upload-only parameters.
        assert!(!link.url.contains("x-id=PutObject"), "{}", link.url);
    }

    #[tokio::test]
    async fn test_issue_twice_yields_two_valid_links() {
        let issuer = test_issuer();
        let first = issuer.issue("a.mp3").await.unwrap();
        let second = issuer.issue("a.mp3").await.unwrap();

        for link in [&first, &second] {
            assert!(link.url.contains("/a.mp3?"), "{}", link.url);
            assert!(link.url.contains("X-Amz-Signature="), "{}", link.url);
        }
    }

    #[tokio::test]
    async fn test_issue_rejects_empty_key() {
        let issuer = test_issuer();
        let err = issuer.issue("").await.unwrap_err();
        assert!(matches!(err, SigningError::EmptyKey));
    }

    /// Stands in for a default chain with no env vars, profile or IMDS.
    #[derive(Debug)]
    struct EmptyChain;

    impl ProvideCredentials for EmptyChain {
        fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
        where
            Self: 'a,
        {
            future::ProvideCredentials::ready(Err(CredentialsError::not_loaded(
                "no providers in chain provided credentials",
            )))
        }
    }

    fn sdk_config(region: Option<&str>, provider: Option<SharedCredentialsProvider>) -> SdkConfig {
        let mut builder = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region.map(|r| Region::new(r.to_string())));
        builder.set_credentials_provider(provider);
        builder.build()
    }

    fn static_credentials() -> SharedCredentialsProvider {
        SharedCredentialsProvider::new(Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"))
    }

    #[tokio::test]
    async fn test_ready_with_region_and_credentials() {
        let config = sdk_config(Some("us-east-1"), Some(static_credentials()));
        assert_eq!(ensure_signing_ready(&config).await.unwrap(), "us-east-1");
    }

    #[tokio::test]
    async fn test_empty_credential_chain_fails_startup() {
        let config = sdk_config(
            Some("us-east-1"),
            Some(SharedCredentialsProvider::new(EmptyChain)),
        );
        let err = ensure_signing_ready(&config).await.unwrap_err();
        assert!(matches!(err, SigningError::Config(ref m) if m.contains("credentials")), "{}", err);
    }

    #[tokio::test]
    async fn test_missing_provider_fails_startup() {
        let config = sdk_config(Some("us-east-1"), None);
        assert!(matches!(
            ensure_signing_ready(&config).await,
            Err(SigningError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_region_fails_startup() {
        let config = sdk_config(None, Some(static_credentials()));
        let err = ensure_signing_ready(&config).await.unwrap_err();
        assert!(matches!(err, SigningError::Config(ref m) if m.contains("region")), "{}", err);
    }
}
