use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_dynamodb::Client;
use tracing_subscriber::{
    filter::{filter_fn, LevelFilter},
    fmt,
    prelude::*,
    EnvFilter,
};

use crate::errors::{Error, Result};
use crate::interceptor::SegmentInterceptor;
use crate::session::{Session, TELEMETRY_TARGET};

/// Installs the global subscriber: JSON application logs on stdout, session
/// diagnostics on the session's info logger, and spans exported through the
/// session's tracer.
pub fn setup_tracing(session: &Session) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let app_logs = fmt::layer()
        .json()
        .with_filter(filter_fn(|meta| meta.target() != TELEMETRY_TARGET));
    let diagnostics = fmt::layer()
        .with_writer(session.config().info_logger.make_writer())
        .with_filter(filter_fn(|meta| meta.target() == TELEMETRY_TARGET));

    tracing_subscriber::registry()
        .with(filter)
        .with(app_logs)
        .with(diagnostics)
        .with(session.layer())
        .try_init()
        .map_err(|e| Error::SessionInit(format!("failed to set tracing subscriber: {e}")))
}

/// Loads the shared SDK config for `region` from the default provider chain.
pub async fn setup_sdk_config(region: &str, endpoint_url: Option<&str>) -> Result<SdkConfig> {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_owned()));

    if let Some(url) = endpoint_url {
        validate_endpoint_url(url)?;
        loader = loader.endpoint_url(url);
    }

    let config = loader.load().await;
    resolve_credentials(config.credentials_provider()).await?;

    Ok(config)
}

/// Resolves credentials once up front so a broken chain fails before the scan.
async fn resolve_credentials(provider: Option<SharedCredentialsProvider>) -> Result<()> {
    let provider = provider.ok_or_else(|| {
        Error::ClientInit("no credentials provider is configured".to_owned())
    })?;

    provider
        .provide_credentials()
        .await
        .map_err(|e| Error::ClientInit(format!("unable to resolve credentials: {e}")))?;
    Ok(())
}

fn validate_endpoint_url(url: &str) -> Result<()> {
    let uri = url
        .parse::<http::Uri>()
        .map_err(|e| Error::ClientInit(format!("invalid endpoint url {url}: {e}")))?;

    match (uri.scheme_str(), uri.host()) {
        (Some("http" | "https"), Some(_)) => Ok(()),
        _ => Err(Error::ClientInit(format!(
            "invalid endpoint url {url}: expected http(s)://host[:port]"
        ))),
    }
}

/// DynamoDB client whose calls are reported as segments of the current transaction.
pub fn dynamodb_client(config: &SdkConfig) -> Client {
    let ddb_config = aws_sdk_dynamodb::config::Builder::from(config)
        .interceptor(SegmentInterceptor)
        .build();
    Client::from_conf(ddb_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_credential_types::{provider::error::CredentialsError, provider::future, Credentials};
    use rstest::rstest;

    #[rstest]
    #[case::local("http://localhost:8000")]
    #[case::tls("https://dynamodb.eu-west-1.amazonaws.com")]
    fn accepts_endpoint_urls(#[case] url: &str) {
        assert!(validate_endpoint_url(url).is_ok());
    }

    #[rstest]
    #[case::no_scheme("localhost:8000")]
    #[case::bad_scheme("ftp://localhost")]
    #[case::garbage("http://exa mple")]
    fn rejects_endpoint_urls(#[case] url: &str) {
        let err = validate_endpoint_url(url).unwrap_err();
        assert_eq!(err.stage(), "client");
    }

    #[derive(Debug)]
    struct NoCredentials;

    impl ProvideCredentials for NoCredentials {
        fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
        where
            Self: 'a,
        {
            future::ProvideCredentials::ready(Err(CredentialsError::not_loaded(
                "no providers in chain provided credentials",
            )))
        }
    }

    #[tokio::test]
    async fn resolves_static_credentials() {
        let provider = SharedCredentialsProvider::new(Credentials::new(
            "akid", "secret", None, None, "test",
        ));

        assert!(resolve_credentials(Some(provider)).await.is_ok());
    }

    #[tokio::test]
    async fn unresolvable_credentials_are_client_errors() {
        let err = resolve_credentials(Some(SharedCredentialsProvider::new(NoCredentials)))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "client");
        assert!(err.to_string().contains("unable to resolve credentials"));
    }

    #[tokio::test]
    async fn missing_provider_is_client_error() {
        let err = resolve_credentials(None).await.unwrap_err();
        assert!(matches!(err, Error::ClientInit(_)));
    }

    #[tokio::test]
    async fn bad_endpoint_fails_before_loading() {
        let err = setup_sdk_config("eu-west-1", Some("not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ClientInit(_)));
    }
}
