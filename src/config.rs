use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::context::STORAGE_PREFIX;

/// Declarative inputs for one slideshow. Exactly one of the three file-spec
/// forms wins at a time: a resolved logo path, then the metadata list, then
/// the pipe-delimited files string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SlideProperties {
    /// Pipe-delimited list of cache paths.
    pub files: String,
    /// Structured per-file metadata; order is significant.
    pub metadata: Vec<FileMetadata>,
    /// Fixed width in pixels; ignored when responsive.
    pub width: Option<u32>,
    /// Fixed height in pixels; ignored when responsive.
    pub height: Option<u32>,
    pub sizing: Sizing,
    pub position: String,
    pub responsive: bool,
    /// Play the resolved brand logo instead of the configured files.
    pub is_logo: bool,
    /// Seconds an image stays up before transitioning.
    pub duration: f64,
    /// Report a done signal after the last file instead of looping.
    pub play_until_done: bool,
}

impl Default for SlideProperties {
    fn default() -> Self {
        Self {
            files: String::new(),
            metadata: Vec::new(),
            width: None,
            height: None,
            sizing: Sizing::default(),
            position: Self::default_position(),
            responsive: true,
            is_logo: false,
            duration: Self::default_duration(),
            play_until_done: false,
        }
    }
}

impl SlideProperties {
    const fn default_duration() -> f64 {
        10.0
    }

    fn default_position() -> String {
        "center".to_owned()
    }

    /// Transition delay, coerced to whole seconds. Zero, negative, or
    /// non-finite durations disable the timer; the image stays up
    /// indefinitely.
    pub fn transition_delay(&self) -> Option<Duration> {
        if !self.duration.is_finite() {
            return None;
        }
        let secs = self.duration.trunc();
        if secs <= 0.0 {
            None
        } else {
            Some(Duration::from_secs(secs as u64))
        }
    }

    /// Delay before an empty or unreachable file set reports completion.
    pub fn empty_done_delay(&self) -> Duration {
        self.transition_delay().unwrap_or(Duration::from_secs(10))
    }

    pub fn layout(&self) -> Layout {
        Layout {
            width: self.width,
            height: self.height,
            sizing: self.sizing,
            position: self.position.clone(),
            responsive: self.responsive,
        }
    }
}

/// One metadata entry accompanying a file-spec.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileMetadata {
    pub file: String,
    #[serde(default = "FileMetadata::default_exists")]
    pub exists: bool,
    /// Creation timestamp in milliseconds; used for preview cache-busting.
    #[serde(default)]
    pub time_created: Option<u64>,
}

impl FileMetadata {
    const fn default_exists() -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sizing {
    #[default]
    Contain,
    Cover,
}

/// Presentation geometry forwarded with every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sizing: Sizing,
    pub position: String,
    pub responsive: bool,
}

/// Top-level configuration for the reference player binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlayerConfig {
    /// Local media cache directory served by the bundled directory sync.
    pub media_root: PathBuf,
    /// Prefix template for preview-mode file URLs.
    pub storage_prefix: String,
    /// How long to wait for the first managed file before giving up.
    #[serde(with = "humantime_serde")]
    pub first_file_timeout: Duration,
    pub slide: SlideProperties,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::new(),
            storage_prefix: STORAGE_PREFIX.to_owned(),
            first_file_timeout: Duration::from_millis(5000),
            slide: SlideProperties::default(),
        }
    }
}

impl PlayerConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&s).context("parsing player configuration")
    }

    /// Validate runtime invariants that cannot be expressed via serde
    /// defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.media_root.as_os_str().is_empty(),
            "media-root must be set"
        );
        ensure!(
            !self.storage_prefix.is_empty(),
            "storage-prefix must not be empty"
        );
        ensure!(
            self.first_file_timeout > Duration::ZERO,
            "first-file-timeout must be positive"
        );
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_delay_coerces_to_whole_seconds() {
        let mut props = SlideProperties::default();
        props.duration = 7.9;
        assert_eq!(props.transition_delay(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn zero_and_invalid_durations_disable_the_timer() {
        let mut props = SlideProperties::default();
        props.duration = 0.0;
        assert_eq!(props.transition_delay(), None);
        props.duration = -3.0;
        assert_eq!(props.transition_delay(), None);
        props.duration = f64::NAN;
        assert_eq!(props.transition_delay(), None);
        props.duration = 0.4;
        assert_eq!(props.transition_delay(), None);
    }

    #[test]
    fn empty_done_delay_falls_back_to_ten_seconds() {
        let mut props = SlideProperties::default();
        props.duration = 0.0;
        assert_eq!(props.empty_done_delay(), Duration::from_secs(10));
        props.duration = 4.0;
        assert_eq!(props.empty_done_delay(), Duration::from_secs(4));
    }
}
