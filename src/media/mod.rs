use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::Result;

/// Media container formats accepted for direct transcription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
    Mp4,
    Mov,
    Mkv,
    Avi,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::M4a => "m4a",
            MediaFormat::Wav => "wav",
            MediaFormat::Flac => "flac",
            MediaFormat::Ogg => "ogg",
            MediaFormat::Webm => "webm",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mov => "mov",
            MediaFormat::Mkv => "mkv",
            MediaFormat::Avi => "avi",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(MediaFormat::Mp3),
            "m4a" | "aac" => Some(MediaFormat::M4a),
            "wav" => Some(MediaFormat::Wav),
            "flac" => Some(MediaFormat::Flac),
            "ogg" => Some(MediaFormat::Ogg),
            "webm" => Some(MediaFormat::Webm),
            "mp4" | "m4v" => Some(MediaFormat::Mp4),
            "mov" => Some(MediaFormat::Mov),
            "mkv" => Some(MediaFormat::Mkv),
            "avi" => Some(MediaFormat::Avi),
            _ => None,
        }
    }

    /// MIME type submitted alongside the payload
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::M4a => "audio/mp4",
            MediaFormat::Wav => "audio/wav",
            MediaFormat::Flac => "audio/flac",
            MediaFormat::Ogg => "audio/ogg",
            MediaFormat::Webm => "video/webm",
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Mov => "video/quicktime",
            MediaFormat::Mkv => "video/x-matroska",
            MediaFormat::Avi => "video/x-msvideo",
        }
    }
}

/// An in-memory media payload queued for transcription
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Arc<[u8]>,
    pub format: MediaFormat,
    pub file_name: String,
}

impl MediaPayload {
    /// Read a local media file into memory
    pub fn read_from(path: &Path) -> Result<Self> {
        let format = path
            .extension()
            .and_then(|ext| MediaFormat::from_extension(&ext.to_string_lossy()))
            .ok_or_else(|| anyhow::anyhow!("unsupported media file type: {}", path.display()))?;

        let bytes = fs_err::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            bytes: bytes.into(),
            format,
            file_name,
        })
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(MediaFormat::from_extension("MP4"), Some(MediaFormat::Mp4));
        assert_eq!(MediaFormat::from_extension("m4v"), Some(MediaFormat::Mp4));
        assert_eq!(MediaFormat::from_extension("aac"), Some(MediaFormat::M4a));
        assert_eq!(MediaFormat::from_extension("txt"), None);
    }

    #[test]
    fn mime_types_cover_video() {
        assert_eq!(MediaFormat::Mp4.mime_type(), "video/mp4");
        assert_eq!(MediaFormat::Mov.mime_type(), "video/quicktime");
        assert_eq!(MediaFormat::Mp3.mime_type(), "audio/mpeg");
    }

    #[test]
    fn read_from_rejects_unknown_extension() {
        let err = MediaPayload::read_from(Path::new("notes.txt")).unwrap_err();
        assert!(err.to_string().contains("unsupported media file type"));
    }
}
