//! Video information structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Container format of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    Webm,
    M4a,
}

impl Container {
    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
            Container::M4a => "m4a",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Video codec carried by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    None,
    H264,
    Vp8,
    Vp9,
}

/// Audio codec carried by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    None,
    Aac,
    Vorbis,
    Opus,
}

/// Static metadata for one stream identifier (itag)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDetails {
    /// Stream identifier
    pub itag: u32,
    /// Vertical pixel count
    pub video_quality: Option<u32>,
    /// Audio bitrate in kbps
    pub audio_bitrate: Option<u32>,
    pub container: Container,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub fps: Option<u32>,
}

impl FormatDetails {
    /// Check if the stream carries audio
    pub fn has_audio(&self) -> bool {
        self.audio_codec != AudioCodec::None
    }

    /// Check if the stream carries video
    pub fn has_video(&self) -> bool {
        self.video_codec != VideoCodec::None
    }

    /// Check if the stream is audio only
    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }

    /// Human readable quality label, e.g. "1080p60" or "128kbps"
    pub fn quality_label(&self) -> String {
        match (self.video_quality, self.audio_bitrate) {
            (Some(height), _) => match self.fps {
                Some(fps) => format!("{}p{}", height, fps),
                None => format!("{}p", height),
            },
            (None, Some(bitrate)) => format!("{}kbps", bitrate),
            (None, None) => "unknown".to_string(),
        }
    }
}

/// A directly fetchable stream with a fully signed URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStream {
    /// Signed URL, fetchable without further processing
    pub url: String,
    pub details: FormatDetails,
    /// Declared content length in bytes
    pub content_length: u64,
}

/// Page level metadata and the resolved streams for one video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDescriptor {
    /// Stable video identifier
    pub id: String,
    pub title: String,
    /// Streams in payload order
    pub streams: Vec<ResolvedStream>,
    /// Identifiers present in the payload but absent from the format catalog
    #[serde(default)]
    pub unsupported_itags: Vec<u32>,
}

impl PartialEq for VideoDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for VideoDescriptor {}

impl VideoDescriptor {
    /// Find a stream by identifier
    pub fn stream(&self, itag: u32) -> Option<&ResolvedStream> {
        self.streams.iter().find(|s| s.details.itag == itag)
    }

    /// Streams that carry video
    pub fn video_streams(&self) -> Vec<&ResolvedStream> {
        self.streams.iter().filter(|s| s.details.has_video()).collect()
    }

    /// Best audio-only companion for a video-only stream in `container`.
    ///
    /// WebM video pairs with WebM audio; everything else pairs with M4A.
    pub fn best_audio_for(&self, container: Container) -> Option<&ResolvedStream> {
        let wanted = match container {
            Container::Webm => Container::Webm,
            _ => Container::M4a,
        };

        self.streams
            .iter()
            .filter(|s| s.details.container == wanted && s.details.is_audio_only())
            .filter(|s| s.details.audio_bitrate.is_some())
            .max_by_key(|s| s.details.audio_bitrate)
    }
}

/// A caller's choice of stream, handed to the download orchestrator
#[derive(Debug, Clone)]
pub struct QueuedDownload {
    pub video: VideoDescriptor,
    pub selected: ResolvedStream,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::formats::lookup;

    fn stream(itag: u32) -> ResolvedStream {
        ResolvedStream {
            url: format!("https://media.test/{}", itag),
            details: lookup(itag).unwrap(),
            content_length: 100,
        }
    }

    fn descriptor(itags: &[u32]) -> VideoDescriptor {
        VideoDescriptor {
            id: "abc".to_string(),
            title: "Title".to_string(),
            streams: itags.iter().map(|i| stream(*i)).collect(),
            unsupported_itags: Vec::new(),
        }
    }

    #[test]
    fn test_best_audio_prefers_matching_container() {
        let video = descriptor(&[137, 248, 139, 140, 171, 251]);

        let mp4_audio = video.best_audio_for(Container::Mp4).unwrap();
        assert_eq!(mp4_audio.details.itag, 140);

        let webm_audio = video.best_audio_for(Container::Webm).unwrap();
        assert_eq!(webm_audio.details.itag, 251);
    }

    #[test]
    fn test_best_audio_missing() {
        let video = descriptor(&[137, 248]);
        assert!(video.best_audio_for(Container::Mp4).is_none());
    }

    #[test]
    fn test_video_streams_and_lookup() {
        let video = descriptor(&[160, 140, 37]);
        let itags: Vec<u32> = video.video_streams().iter().map(|s| s.details.itag).collect();
        assert_eq!(itags, vec![160, 37]);
        assert!(video.stream(140).is_some());
        assert!(video.stream(999).is_none());
    }

    #[test]
    fn test_descriptor_identity() {
        let a = descriptor(&[137]);
        let mut b = descriptor(&[140]);
        b.title = "Other".to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn test_quality_label() {
        assert_eq!(lookup(298).unwrap().quality_label(), "1080p60");
        assert_eq!(lookup(137).unwrap().quality_label(), "1080p");
        assert_eq!(lookup(140).unwrap().quality_label(), "128kbps");
    }
}
