//! Obtain Google credentials for the upload.
//!
//! ## Why spawn_blocking?
//!
//! The OAuth flow in `md2docs-auth` is synchronous: it reads and writes the
//! token cache, calls the token endpoint with a blocking HTTP client, and in
//! the interactive case parks on a loopback socket until the browser redirect
//! arrives. Running it on the blocking pool keeps the Tokio workers free.

use crate::config::ConversionConfig;
use crate::error::Md2DocsError;
use md2docs_auth::StoredToken;
use tracing::info;

/// Load, refresh or interactively obtain a token per
/// [`md2docs_auth::authorize`].
///
/// The consent URL of an interactive flow is passed to the configured
/// progress callback's `on_authorization_required`.
pub async fn obtain_credentials(config: &ConversionConfig) -> Result<StoredToken, Md2DocsError> {
    let auth = config.auth.clone();
    let progress = config.progress_callback.clone();

    let result = tokio::task::spawn_blocking(move || {
        let on_url = |url: &str| {
            info!("Authorization required: {url}");
            if let Some(cb) = &progress {
                cb.on_authorization_required(url);
            }
        };
        md2docs_auth::authorize(&auth, Some(&on_url as &dyn Fn(&str)))
    })
    .await
    .map_err(|e| Md2DocsError::Internal(format!("Auth task panicked: {}", e)))?;

    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use md2docs_auth::{save_token, AuthConfig};

    fn config_in(dir: &std::path::Path) -> ConversionConfig {
        ConversionConfig {
            auth: AuthConfig {
                token_path: dir.join("token.json"),
                client_secret_override: None,
                client_secret_candidates: vec![dir.join("client_secret.json")],
                ..AuthConfig::default()
            },
            ..ConversionConfig::default()
        }
    }

    #[tokio::test]
    async fn valid_cached_token_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let token = StoredToken {
            token: "ya29.cached".into(),
            refresh_token: Some("1//refresh".into()),
            token_uri: "https://oauth2.googleapis.com/token".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            scopes: vec![md2docs_auth::DRIVE_FILE_SCOPE.into()],
            expiry: Some(Utc::now() + Duration::hours(1)),
        };
        save_token(&config.auth.token_path, &token).unwrap();

        let got = obtain_credentials(&config).await.unwrap();
        assert_eq!(got.access_token(), "ya29.cached");
    }

    #[tokio::test]
    async fn missing_client_secret_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = obtain_credentials(&config_in(dir.path())).await.unwrap_err();
        assert!(err.is_missing_credentials(), "got: {err}");
    }
}
