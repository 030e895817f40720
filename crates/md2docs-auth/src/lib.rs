//! # md2docs-auth
//!
//! OAuth2 credentials for the Google Drive API using the "installed
//! application" flow, with a JSON token cache on disk so the browser consent
//! step only happens once per machine.
//!
//! ## How it works
//!
//! On each call to [`authorize`]:
//!
//! 1. Loads the cached token from [`AuthConfig::token_path`] (if any).
//! 2. Classifies it as [`TokenState::Valid`], [`TokenState::Expired`] or
//!    [`TokenState::Missing`].
//! 3. Valid tokens are reused as-is. Expired tokens with a refresh token are
//!    refreshed silently. Everything else goes through the interactive flow:
//!    a loopback listener on `127.0.0.1:<ephemeral>` receives the browser
//!    redirect and the authorization code is exchanged for a token.
//! 4. The resulting token is written back to the cache.
//!
//! The protocol itself (consent URL, `state`, PKCE, code exchange and refresh
//! grant) is handled by the [`oauth2`] crate; this crate adds the client
//! secret lookup, the loopback listener and the token cache around it.
//!
//! The interactive flow needs an application credential ("client secret")
//! downloaded from the Google Cloud console. It is never created by this
//! crate; when none can be found [`AuthError::ClientSecretNotFound`] carries
//! the setup instructions.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use md2docs_auth::{authorize, AuthConfig};
//!
//! let config = AuthConfig::default();
//! let token = authorize(&config, Some(&|url: &str| {
//!     eprintln!("Open this URL to continue: {url}");
//! }))
//! .expect("authorization failed");
//! println!("access token expires at {:?}", token.expiry);
//! ```
//!
//! ## Environment variable overrides
//!
//! - `MD2DOCS_CLIENT_SECRET` — path to the client secret JSON; checked before
//!   the default locations.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::url::Url;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// ── Public constants ─────────────────────────────────────────────────────────

/// Scope granting access only to files created by this application.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Environment variable overriding the client secret location.
pub const CLIENT_SECRET_ENV: &str = "MD2DOCS_CLIENT_SECRET";

/// Tokens expiring within this many seconds are treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const SUCCESS_PAGE: &str = "<html><body><p>The authentication flow has completed. \
You may close this window.</p></body></html>";
const DENIED_PAGE: &str = "<html><body><p>Authorization was not granted. \
You may close this window.</p></body></html>";

/// OAuth client with the authorization and token endpoints configured.
pub type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by md2docs-auth operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No client secret file exists at any of the searched locations.
    #[error(
        "No client_secret.json found (searched: {searched}).\n\n\
Setup instructions:\n\
  1. Go to https://console.cloud.google.com/apis/credentials\n\
  2. Create an OAuth 2.0 Client ID (Desktop app)\n\
  3. Download the JSON and save it to: ~/.md2docs/client_secret.json\n\n\
  Or set MD2DOCS_CLIENT_SECRET=/path/to/client_secret.json"
    )]
    ClientSecretNotFound { searched: String },

    /// The client secret file exists but is not a usable credential.
    #[error("Invalid client secret '{path}': {reason}")]
    InvalidClientSecret { path: PathBuf, reason: String },

    /// An endpoint or redirect URI is not a valid URL.
    #[error("Invalid OAuth endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// Reading or writing the token cache failed.
    #[error("Token cache error at '{path}': {source}")]
    TokenCache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Http(#[source] reqwest::Error),

    /// The token endpoint answered with an OAuth error such as `invalid_grant`.
    #[error("Token endpoint rejected the request: {0}")]
    TokenEndpoint(String),

    /// Transport failure or unreadable response from the token endpoint.
    #[error("Token request to {endpoint} failed: {reason}")]
    TokenRequest { endpoint: String, reason: String },

    /// The user (or Google) refused the authorization request.
    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    /// The redirect carried a `state` that does not match the request.
    #[error("Authorization response state mismatch; possible cross-site request")]
    StateMismatch,

    /// The loopback redirect listener failed.
    #[error("Loopback redirect failed: {0}")]
    Redirect(String),
}

impl AuthError {
    /// `true` when the error means the stored grant itself is unusable,
    /// as opposed to a transport failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AuthError::TokenEndpoint(_))
    }
}

// ── Configuration ────────────────────────────────────────────────────────────

/// Locations and scopes used by [`authorize`].
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Token cache file. Default: `~/.md2docs/token.json`.
    pub token_path: PathBuf,
    /// Explicit client secret path, searched before `client_secret_candidates`.
    pub client_secret_override: Option<PathBuf>,
    /// Default client secret locations, searched in order.
    pub client_secret_candidates: Vec<PathBuf>,
    /// OAuth scopes requested during the interactive flow.
    pub scopes: Vec<String>,
    /// Timeout for each token endpoint request.
    pub http_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            token_path: default_config_dir().join("token.json"),
            client_secret_override: std::env::var_os(CLIENT_SECRET_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            client_secret_candidates: vec![
                default_config_dir().join("client_secret.json"),
                home.join(".config").join("md2docs").join("client_secret.json"),
            ],
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// Returns the per-user configuration directory, `~/.md2docs`.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".md2docs")
}

// ── Client secret ────────────────────────────────────────────────────────────

/// An OAuth client registered in the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Parse the JSON downloaded from the console. Both the `installed` and
    /// `web` application layouts are accepted.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: ClientSecretFile = serde_json::from_str(json).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" section".to_string())
    }

    /// Read and parse a client secret file.
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let json = std::fs::read_to_string(path).map_err(|e| AuthError::InvalidClientSecret {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&json).map_err(|reason| AuthError::InvalidClientSecret {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// OAuth client for this registration.
    pub fn oauth_client(&self) -> Result<GoogleClient, AuthError> {
        oauth_client(&self.client_id, &self.client_secret, &self.auth_uri, &self.token_uri)
    }
}

/// Returns the first existing client secret file: `override_path` first,
/// then each of `candidates`.
pub fn locate_client_secret(override_path: Option<&Path>, candidates: &[PathBuf]) -> Option<PathBuf> {
    override_path
        .into_iter()
        .chain(candidates.iter().map(PathBuf::as_path))
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

// ── Token cache ──────────────────────────────────────────────────────────────

/// A cached OAuth token, persisted as JSON.
///
/// Carries the client id and secret so a refresh does not need the client
/// secret file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

/// Validity of the cached credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token cached.
    Missing,
    /// Token is past (or about to pass) its expiry.
    Expired { refreshable: bool },
    /// Token can be used as-is.
    Valid,
}

impl TokenState {
    /// Classify an optional cached token at time `now`.
    pub fn of(token: Option<&StoredToken>, now: DateTime<Utc>) -> Self {
        token.map_or(TokenState::Missing, |t| t.state(now))
    }
}

impl StoredToken {
    /// Classify this token at time `now`. Tokens without an expiry are valid.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        match self.expiry {
            Some(expiry) if expiry <= now + chrono::Duration::seconds(EXPIRY_SKEW_SECS) => {
                TokenState::Expired {
                    refreshable: self.refresh_token.as_deref().is_some_and(|r| !r.is_empty()),
                }
            }
            _ => TokenState::Valid,
        }
    }

    /// The bearer token for API calls.
    pub fn access_token(&self) -> &str {
        &self.token
    }

    /// Take the access token, expiry and any rotated refresh token or
    /// granted scopes from a token endpoint response.
    fn update_from(&mut self, response: &BasicTokenResponse) {
        self.token = response.access_token().secret().clone();
        if let Some(refresh) = response.refresh_token() {
            self.refresh_token = Some(refresh.secret().clone());
        }
        if let Some(scopes) = response.scopes() {
            self.scopes = scopes.iter().map(|s| s.as_str().to_owned()).collect();
        }
        self.expiry = response.expires_in().map(expiry_from_now);
    }
}

/// Load the token cache. A missing file yields `Ok(None)`; an unreadable
/// JSON document is logged and also treated as missing.
pub fn load_token(path: &Path) -> Result<Option<StoredToken>, AuthError> {
    let json = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(AuthError::TokenCache {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match serde_json::from_str(&json) {
        Ok(token) => Ok(Some(token)),
        Err(e) => {
            warn!("Ignoring unreadable token cache {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

/// Write the token cache, creating parent directories. On Unix the file is
/// readable by the owner only.
pub fn save_token(path: &Path, token: &StoredToken) -> Result<(), AuthError> {
    let cache_err = |source| AuthError::TokenCache {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(cache_err)?;
    }

    let json = serde_json::to_string_pretty(token)
        .map_err(|e| cache_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    std::fs::write(path, json).map_err(cache_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(cache_err)?;
    }

    debug!("Saved token cache to {}", path.display());
    Ok(())
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns usable credentials, refreshing or re-authorizing as needed, and
/// persists them to the token cache.
///
/// `on_authorize_url` receives the consent URL when the interactive flow
/// runs. It should open a browser or print the URL; the call then blocks
/// until the browser redirect arrives.
pub fn authorize(
    config: &AuthConfig,
    on_authorize_url: Option<&dyn Fn(&str)>,
) -> Result<StoredToken, AuthError> {
    let http = http_client(config)?;
    let cached = load_token(&config.token_path)?;

    let token = match cached {
        Some(token) => match token.state(Utc::now()) {
            TokenState::Valid => {
                debug!("Using cached token from {}", config.token_path.display());
                token
            }
            TokenState::Expired { refreshable: true } => match refresh_token(&http, &token) {
                Ok(refreshed) => {
                    info!("Refreshed expired access token");
                    refreshed
                }
                Err(e) if e.is_rejection() => {
                    warn!("Token refresh rejected ({e}); starting a new authorization");
                    authorize_interactively(&http, config, on_authorize_url)?
                }
                Err(e) => return Err(e),
            },
            TokenState::Expired { refreshable: false } | TokenState::Missing => {
                authorize_interactively(&http, config, on_authorize_url)?
            }
        },
        None => authorize_interactively(&http, config, on_authorize_url)?,
    };

    save_token(&config.token_path, &token)?;
    Ok(token)
}

/// Exchange a refresh token for a fresh access token. The old refresh token
/// is kept unless the endpoint rotates it.
pub fn refresh_token(
    http: &reqwest::blocking::Client,
    token: &StoredToken,
) -> Result<StoredToken, AuthError> {
    let refresh = RefreshToken::new(token.refresh_token.clone().unwrap_or_default());
    let response = oauth_client(
        &token.client_id,
        &token.client_secret,
        DEFAULT_AUTH_URI,
        &token.token_uri,
    )?
    .exchange_refresh_token(&refresh)
    .request(http)
    .map_err(|e| token_error(&token.token_uri, e))?;

    let mut refreshed = token.clone();
    refreshed.update_from(&response);
    Ok(refreshed)
}

/// A consent URL plus what is needed to finish the exchange.
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: CsrfToken,
    pub pkce_verifier: PkceCodeVerifier,
}

/// Build the consent URL for the authorization-code flow: random `state`,
/// S256 PKCE challenge, offline access so a refresh token is issued.
pub fn authorization_url(client: &GoogleClient, scopes: &[String]) -> AuthorizationRequest {
    let (challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (url, state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes.iter().cloned().map(Scope::new))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(challenge)
        .url();

    AuthorizationRequest {
        url,
        state,
        pkce_verifier,
    }
}

/// What the browser redirect delivered to the loopback listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Consent granted.
    Code { code: String, state: Option<String> },
    /// Consent refused or failed.
    Denied { error: String },
}

/// Parse an HTTP request line such as `GET /?code=..&state=.. HTTP/1.1`.
///
/// Returns `None` for requests that carry neither `code` nor `error`
/// (favicon fetches, speculative connections).
pub fn parse_redirect_request(request_line: &str) -> Option<RedirectOutcome> {
    let target = request_line.split_whitespace().nth(1)?;
    let url = Url::parse(&format!("http://127.0.0.1{target}")).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match &*key {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (code, error) {
        (_, Some(error)) => Some(RedirectOutcome::Denied { error }),
        (Some(code), None) => Some(RedirectOutcome::Code { code, state }),
        (None, None) => None,
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn oauth_client(
    client_id: &str,
    client_secret: &str,
    auth_uri: &str,
    token_uri: &str,
) -> Result<GoogleClient, AuthError> {
    let auth_url = AuthUrl::new(auth_uri.to_string()).map_err(|e| invalid_endpoint(auth_uri, e))?;
    let token_url =
        TokenUrl::new(token_uri.to_string()).map_err(|e| invalid_endpoint(token_uri, e))?;

    Ok(BasicClient::new(ClientId::new(client_id.to_string()))
        .set_client_secret(oauth2::ClientSecret::new(client_secret.to_string()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_auth_type(AuthType::RequestBody))
}

fn invalid_endpoint(url: &str, e: impl std::fmt::Display) -> AuthError {
    AuthError::InvalidEndpoint {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

fn token_error<RE>(endpoint: &str, err: RequestTokenError<RE, BasicErrorResponse>) -> AuthError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => AuthError::TokenEndpoint(response.to_string()),
        other => AuthError::TokenRequest {
            endpoint: endpoint.to_string(),
            reason: other.to_string(),
        },
    }
}

fn http_client(config: &AuthConfig) -> Result<reqwest::blocking::Client, AuthError> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("md2docs-auth/", env!("CARGO_PKG_VERSION")))
        .timeout(config.http_timeout)
        // Token endpoints must not redirect.
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(AuthError::Http)
}

fn authorize_interactively(
    http: &reqwest::blocking::Client,
    config: &AuthConfig,
    on_authorize_url: Option<&dyn Fn(&str)>,
) -> Result<StoredToken, AuthError> {
    let path = locate_client_secret(
        config.client_secret_override.as_deref(),
        &config.client_secret_candidates,
    )
    .ok_or_else(|| AuthError::ClientSecretNotFound {
        searched: config
            .client_secret_override
            .iter()
            .chain(config.client_secret_candidates.iter())
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })?;
    debug!("Using client secret {}", path.display());
    let secret = ClientSecret::from_file(&path)?;

    let listener = TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| AuthError::Redirect(format!("cannot bind loopback listener: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| AuthError::Redirect(e.to_string()))?
        .port();
    let redirect_uri = format!("http://127.0.0.1:{port}/");

    let client = secret.oauth_client()?.set_redirect_uri(
        RedirectUrl::new(redirect_uri.clone()).map_err(|e| invalid_endpoint(&redirect_uri, e))?,
    );
    let request = authorization_url(&client, &config.scopes);

    info!("Waiting for browser authorization on {}", redirect_uri);
    if let Some(cb) = on_authorize_url {
        cb(request.url.as_str());
    }

    let code = wait_for_code(&listener, request.state.secret())?;
    let response = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(request.pkce_verifier)
        .request(http)
        .map_err(|e| token_error(&secret.token_uri, e))?;

    let mut token = StoredToken {
        token: String::new(),
        refresh_token: None,
        token_uri: secret.token_uri,
        client_id: secret.client_id,
        client_secret: secret.client_secret,
        scopes: config.scopes.clone(),
        expiry: None,
    };
    token.update_from(&response);
    Ok(token)
}

/// Accept connections until one carries the authorization response.
fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("Loopback accept failed: {e}");
                continue;
            }
        };
        let _ = stream.set_read_timeout(Some(Duration::from_secs(10)));

        let mut line = String::new();
        {
            let mut reader = BufReader::new(&stream);
            if reader.read_line(&mut line).is_err() || line.trim().is_empty() {
                continue;
            }
            // Drain the headers so closing the socket does not reset it.
            let mut header = String::new();
            while matches!(reader.read_line(&mut header), Ok(n) if n > 0)
                && !header.trim_end().is_empty()
            {
                header.clear();
            }
        }

        match parse_redirect_request(&line) {
            Some(RedirectOutcome::Code { state, .. }) if state.as_deref() != Some(expected_state) => {
                respond(&mut stream, "400 Bad Request", DENIED_PAGE);
                return Err(AuthError::StateMismatch);
            }
            Some(RedirectOutcome::Code { code, .. }) => {
                respond(&mut stream, "200 OK", SUCCESS_PAGE);
                return Ok(code);
            }
            Some(RedirectOutcome::Denied { error }) => {
                respond(&mut stream, "200 OK", DENIED_PAGE);
                return Err(AuthError::AuthorizationDenied(error));
            }
            None => respond(&mut stream, "404 Not Found", ""),
        }
    }

    Err(AuthError::Redirect("listener closed before a redirect arrived".into()))
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()) {
        debug!("Could not answer loopback request: {e}");
    }
}

fn expiry_from_now(expires_in: Duration) -> DateTime<Utc> {
    let secs = expires_in.as_secs().min(u64::from(u32::MAX));
    Utc::now() + chrono::Duration::seconds(secs as i64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
