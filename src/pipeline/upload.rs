//! Upload the HTML document to Google Drive as a native Google Doc.
//!
//! Uses the Drive v3 resumable protocol: a metadata `POST` opens an upload
//! session (the target MIME type `application/vnd.google-apps.document`
//! asks Drive to convert), then the HTML bytes are `PUT` to the session URL.
//!
//! The document is staged in a named temp file first; the file is removed
//! when the guard drops, whether or not the upload succeeds.

use crate::config::ConversionConfig;
use crate::error::Md2DocsError;
use crate::output::UploadedDocument;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";
const HTML_MIME: &str = "text/html";

/// The fields requested from `files.create`.
#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
}

impl DriveFile {
    fn into_document(self) -> UploadedDocument {
        let url = self
            .web_view_link
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| format!("https://docs.google.com/document/d/{}/edit", self.id));
        UploadedDocument { id: self.id, url }
    }
}

/// Create a Google Doc named `title` from a complete HTML document.
pub async fn upload_document(
    title: &str,
    html: &str,
    access_token: &str,
    config: &ConversionConfig,
) -> Result<UploadedDocument, Md2DocsError> {
    let staged = stage_html(html)?;
    let bytes = tokio::fs::read(staged.path())
        .await
        .map_err(|source| Md2DocsError::Io {
            path: staged.path().to_path_buf(),
            source,
        })?;

    let base = config.drive_api_base.trim_end_matches('/');
    let endpoint =
        format!("{base}/upload/drive/v3/files?uploadType=resumable&fields=id,webViewLink");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api_timeout_secs))
        .build()
        .map_err(|source| Md2DocsError::Http {
            endpoint: endpoint.clone(),
            source,
        })?;

    // ── Open the upload session ──────────────────────────────────────────
    let metadata = serde_json::json!({ "name": title, "mimeType": GOOGLE_DOC_MIME });
    let response = client
        .post(&endpoint)
        .bearer_auth(access_token)
        .header("X-Upload-Content-Type", HTML_MIME)
        .header("X-Upload-Content-Length", bytes.len())
        .json(&metadata)
        .send()
        .await
        .map_err(|source| Md2DocsError::Http {
            endpoint: endpoint.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Md2DocsError::UploadFailed {
            status: status.as_u16(),
            body,
        });
    }

    let session = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Md2DocsError::UploadFailed {
            status: status.as_u16(),
            body: "Drive did not return an upload session URL".to_string(),
        })?;
    debug!("Upload session opened ({} bytes to send)", bytes.len());

    // ── Send the document ────────────────────────────────────────────────
    let response = client
        .put(&session)
        .bearer_auth(access_token)
        .header(CONTENT_TYPE, HTML_MIME)
        .body(bytes)
        .send()
        .await
        .map_err(|source| Md2DocsError::Http {
            endpoint: session.clone(),
            source,
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|source| Md2DocsError::Http {
        endpoint: session.clone(),
        source,
    })?;
    if !status.is_success() {
        return Err(Md2DocsError::UploadFailed {
            status: status.as_u16(),
            body,
        });
    }

    let file: DriveFile =
        serde_json::from_str(&body).map_err(|e| Md2DocsError::UploadFailed {
            status: status.as_u16(),
            body: format!("unexpected response ({e}): {body}"),
        })?;

    let document = file.into_document();
    info!("Created Google Doc {}", document.id);
    Ok(document)
}

/// Write the document to a `md2docs-*.html` temp file.
fn stage_html(html: &str) -> Result<NamedTempFile, Md2DocsError> {
    let mut file = tempfile::Builder::new()
        .prefix("md2docs-")
        .suffix(".html")
        .tempfile()
        .map_err(|source| Md2DocsError::Io {
            path: std::env::temp_dir(),
            source,
        })?;

    file.write_all(html.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|source| Md2DocsError::Io {
            path: file.path().to_path_buf(),
            source,
        })?;

    debug!("Staged {} bytes at {}", html.len(), file.path().display());
    Ok(file)
}
