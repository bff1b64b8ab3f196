//! Media-domain enums for output formats and resolution limits.
//!
//! All enums serialize in lowercase (via `serde(rename_all = "lowercase")`) and
//! implement `Display` manually for consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Resolution used when a request does not specify one.
pub const DEFAULT_RESOLUTION: u32 = 1080;

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Target format of every fetched item and of the merged artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp3,
    M4a,
    Mp4,
    Mkv,
    Webm,
}

impl OutputFormat {
    /// File extension used for per-item files and the merged artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
        }
    }

    /// Whether items are fetched as extracted audio rather than video.
    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Mp3 | Self::M4a)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "m4a" => Ok(Self::M4a),
            "mp4" => Ok(Self::Mp4),
            "mkv" | "matroska" => Ok(Self::Mkv),
            "webm" => Ok(Self::Webm),
            other => Err(Error::Validation(format!("unsupported format: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolution as it arrives on the wire: either a number or a string such as
/// `"720"` or `"720p"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawResolution {
    Number(u64),
    Text(String),
}

impl RawResolution {
    /// Parse into a maximum vertical pixel count.
    pub fn to_height(&self) -> crate::Result<u32> {
        let height = match self {
            Self::Number(n) => u32::try_from(*n).ok(),
            Self::Text(s) => {
                let trimmed = s.trim();
                let digits = trimmed
                    .strip_suffix('p')
                    .or_else(|| trimmed.strip_suffix('P'))
                    .unwrap_or(trimmed);
                digits.parse::<u32>().ok()
            }
        };

        match height {
            Some(h) if h > 0 => Ok(h),
            _ => Err(Error::Validation(format!("invalid resolution: {self}"))),
        }
    }
}

impl fmt::Display for RawResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}
