//! Editor-preview playback path: no licensing, no sync subsystem.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use crate::config::FileMetadata;
use crate::context::ViewerIdentity;
use crate::events::{FileStatus, ManagedFile};

use super::Engine;

/// Everything except unreserved characters and path separators is escaped;
/// the prefix template already carries scheme and host.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

impl Engine {
    /// Synthesize managed files directly from the declarative metadata and
    /// feed them to the sequencer, bypassing watch and licensing entirely.
    pub(super) async fn start_preview(&mut self) {
        debug!(files = self.valid_files.len(), "starting in preview mode");
        let managed = self
            .valid_files
            .iter()
            .map(|file| {
                let status = if self.preview_file_deleted(file) {
                    FileStatus::Deleted
                } else {
                    FileStatus::Current
                };
                let url = preview_file_url(
                    &self.ctx.storage_prefix,
                    file,
                    self.metadata_for(file),
                    &self.ctx.environment.viewer,
                );
                (
                    file.clone(),
                    ManagedFile {
                        file_path: file.clone(),
                        file_url: url,
                        status,
                    },
                )
            })
            .collect();
        self.managed = managed;
        self.configure_showing_images().await;
    }

    fn preview_file_deleted(&self, file: &str) -> bool {
        // Logo files are never considered deletable.
        if self.props.is_logo {
            return false;
        }
        self.props
            .metadata
            .iter()
            .any(|m| m.file == file && !m.exists)
    }

    fn metadata_for(&self, file: &str) -> Option<&FileMetadata> {
        self.props.metadata.iter().find(|m| m.file == file)
    }
}

/// Direct storage URL for preview playback: percent-encoded path on the
/// prefix template, a cache-busting parameter from the metadata creation
/// time, and viewer identity parameters when the host provides them.
pub(crate) fn preview_file_url(
    prefix: &str,
    file: &str,
    metadata: Option<&FileMetadata>,
    viewer: &ViewerIdentity,
) -> String {
    let encoded = utf8_percent_encode(file, PATH_SEGMENT).to_string();
    let mut url = format!("{prefix}{encoded}");
    let mut params: Vec<String> = Vec::new();
    if let Some(time_created) = metadata.and_then(|m| m.time_created) {
        params.push(format!("cb={time_created}"));
    }
    if let Some(display_id) = viewer.display_id.as_deref() {
        params.push(format!("did={display_id}"));
    }
    if let Some(company_id) = viewer.company_id.as_deref() {
        params.push(format!("cid={company_id}"));
    }
    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(file: &str, time_created: Option<u64>) -> FileMetadata {
        FileMetadata {
            file: file.to_owned(),
            exists: true,
            time_created,
        }
    }

    #[test]
    fn encodes_path_segments_but_not_separators() {
        let url = preview_file_url(
            "https://storage.googleapis.com/",
            "bucket/some folder/img #1.png",
            None,
            &ViewerIdentity::default(),
        );
        assert_eq!(
            url,
            "https://storage.googleapis.com/bucket/some%20folder/img%20%231.png"
        );
    }

    #[test]
    fn appends_cache_buster_and_viewer_identity() {
        let viewer = ViewerIdentity {
            display_id: Some("DISP1".to_owned()),
            company_id: Some("CO9".to_owned()),
        };
        let meta = metadata("b/x.png", Some(1597697918000));
        let url = preview_file_url("https://storage.googleapis.com/", "b/x.png", Some(&meta), &viewer);
        assert_eq!(
            url,
            "https://storage.googleapis.com/b/x.png?cb=1597697918000&did=DISP1&cid=CO9"
        );
    }

    #[test]
    fn identity_fields_are_independently_optional() {
        let viewer = ViewerIdentity {
            display_id: None,
            company_id: Some("CO9".to_owned()),
        };
        let url = preview_file_url("p/", "x.png", None, &viewer);
        assert_eq!(url, "p/x.png?cid=CO9");
    }
}
