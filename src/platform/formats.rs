//! Static catalog of known stream identifiers (itags)

use crate::core::video_info::{AudioCodec, Container, FormatDetails, VideoCodec};

const fn video(itag: u32, height: u32, container: Container, codec: VideoCodec) -> FormatDetails {
    FormatDetails {
        itag,
        video_quality: Some(height),
        audio_bitrate: None,
        container,
        video_codec: codec,
        audio_codec: AudioCodec::None,
        fps: None,
    }
}

const fn video_fps(
    itag: u32,
    height: u32,
    container: Container,
    codec: VideoCodec,
    fps: u32,
) -> FormatDetails {
    let mut details = video(itag, height, container, codec);
    details.fps = Some(fps);
    details
}

const fn audio(itag: u32, bitrate: u32, container: Container, codec: AudioCodec) -> FormatDetails {
    FormatDetails {
        itag,
        video_quality: None,
        audio_bitrate: Some(bitrate),
        container,
        video_codec: VideoCodec::None,
        audio_codec: codec,
        fps: None,
    }
}

const fn combined(
    itag: u32,
    height: u32,
    container: Container,
    vcodec: VideoCodec,
    acodec: AudioCodec,
    bitrate: u32,
) -> FormatDetails {
    FormatDetails {
        itag,
        video_quality: Some(height),
        audio_bitrate: Some(bitrate),
        container,
        video_codec: vcodec,
        audio_codec: acodec,
        fps: None,
    }
}

use AudioCodec::{Aac, Opus, Vorbis};
use Container::{M4a, Mp4, Webm};
use VideoCodec::{Vp8, Vp9, H264};

static CATALOG: &[FormatDetails] = &[
    // Video with audio
    combined(37, 1080, Mp4, H264, Aac, 192),
    combined(46, 1080, Webm, Vp8, Vorbis, 192),
    // DASH MP4 video
    video(160, 144, Mp4, H264),
    video(133, 240, Mp4, H264),
    video(134, 360, Mp4, H264),
    video(135, 480, Mp4, H264),
    video(136, 720, Mp4, H264),
    video(137, 1080, Mp4, H264),
    video(264, 1440, Mp4, H264),
    video(266, 2160, Mp4, H264),
    video_fps(298, 1080, Mp4, H264, 60),
    video_fps(299, 2160, Mp4, H264, 60),
    // DASH MP4 audio
    audio(139, 48, M4a, Aac),
    audio(140, 128, M4a, Aac),
    audio(141, 256, M4a, Aac),
    audio(256, 192, M4a, Aac),
    audio(258, 384, M4a, Aac),
    // DASH WebM audio
    audio(171, 128, Webm, Vorbis),
    audio(172, 256, Webm, Vorbis),
    audio(249, 50, Webm, Opus),
    audio(250, 70, Webm, Opus),
    audio(251, 160, Webm, Opus),
    // DASH WebM video
    video(278, 144, Webm, Vp9),
    video(242, 240, Webm, Vp9),
    video(243, 360, Webm, Vp9),
    video(244, 480, Webm, Vp9),
    video(245, 480, Webm, Vp9),
    video(246, 480, Webm, Vp9),
    video(247, 720, Webm, Vp9),
    video(248, 1080, Webm, Vp9),
    video(271, 1440, Webm, Vp9),
    video(272, 2160, Webm, Vp9),
    video_fps(302, 720, Webm, Vp9, 60),
    video_fps(303, 1080, Webm, Vp9, 60),
    video_fps(308, 1440, Webm, Vp9, 60),
    video(313, 2160, Webm, Vp9),
    video_fps(315, 2160, Webm, Vp9, 60),
];

/// Look up the metadata for an itag
pub fn lookup(itag: u32) -> Option<FormatDetails> {
    CATALOG.iter().find(|details| details.itag == itag).copied()
}

/// Check if an itag is in the catalog
pub fn is_known(itag: u32) -> bool {
    lookup(itag).is_some()
}

/// All catalog entries
pub fn catalog() -> &'static [FormatDetails] {
    CATALOG
}
