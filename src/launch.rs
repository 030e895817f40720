//! Open a URL in the user's default browser.

use tracing::{debug, warn};

/// Open `url` with the platform's default handler.
///
/// Returns `false` if no handler could be launched; the failure is logged
/// and never fatal, since the caller has already printed the link.
pub fn open_in_browser(url: &str) -> bool {
    match open::that_detached(url) {
        Ok(()) => {
            debug!("Opened {url} in browser");
            true
        }
        Err(e) => {
            warn!("Could not open a browser for {url}: {e}");
            false
        }
    }
}
