//! Image encoding: PNG bytes → base64 `data:` URI inside an `<img>` tag.
//!
//! Google Docs' HTML importer fetches nothing over the network, so diagram
//! images have to travel inline with the document.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Encode PNG bytes as a `data:image/png;base64,…` URI.
pub fn png_data_uri(png: &[u8]) -> String {
    let b64 = STANDARD.encode(png);
    debug!("Encoded image → {} bytes base64", b64.len());
    format!("data:image/png;base64,{b64}")
}

/// Build the `<img>` element that replaces a diagram placeholder.
pub fn image_tag(png: &[u8]) -> String {
    format!(r#"<img src="{}" style="max-width:100%">"#, png_data_uri(png))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_is_decodable() {
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let uri = png_data_uri(&png);
        let payload = uri.strip_prefix("data:image/png;base64,").expect("prefix");
        assert_eq!(STANDARD.decode(payload).expect("valid base64"), png);
    }

    #[test]
    fn image_tag_shape() {
        let tag = image_tag(b"png");
        assert!(tag.starts_with(r#"<img src="data:image/png;base64,"#));
        assert!(tag.ends_with(r#"" style="max-width:100%">"#));
    }
}
