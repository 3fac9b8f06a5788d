//! SVG fetch-and-inline conversion.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::info;

use crate::context::SyncClient;
use crate::error::Error;

/// Fetch `url` as a binary blob and re-encode it as a `data:` URL so the
/// paint primitive renders vector content from memory instead of
/// re-resolving the cache URL. Fails with a descriptive reason; callers log
/// and report, they do not retry.
pub async fn inline_as_data_url(
    sync: &SyncClient,
    file_path: &str,
    url: &str,
) -> Result<String, Error> {
    let blob = sync.fetch(url).await?;
    let data_url = to_data_url(&blob);
    info!(
        file = file_path,
        blob_size = blob.len(),
        data_url_length = data_url.len(),
        "inlined svg as data url"
    );
    Ok(data_url)
}

fn to_data_url(blob: &[u8]) -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(blob))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_the_blob_as_a_data_url() {
        let url = to_data_url(b"<svg/>");
        assert_eq!(url, "data:image/svg+xml;base64,PHN2Zy8+");
    }

    #[test]
    fn empty_blob_still_produces_a_well_formed_url() {
        assert_eq!(to_data_url(b""), "data:image/svg+xml;base64,");
    }
}
