//! Streaming download orchestrator

use crate::core::progress::{format_bytes, ProgressSink, ProgressTracker};
use crate::core::video_info::{Container, ResolvedStream, VideoDescriptor};
use crate::download::muxer::Muxer;
use crate::error::MediaError;
use crate::platform::client::{HttpClientConfig, VideoClient};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Download orchestrator configuration
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub http: HttpClientConfig,
    /// Where separate streams are staged before muxing; system temp dir when unset
    pub temp_dir: Option<PathBuf>,
    /// Remux tool, looked up on `PATH` when not absolute
    pub ffmpeg_path: PathBuf,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            http: HttpClientConfig::default(),
            temp_dir: None,
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

impl DownloaderConfig {
    pub fn with_http(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }
}

/// What has to be fetched to produce one output file
#[derive(Debug, Clone)]
pub enum DownloadPlan {
    /// A stream carrying everything, written straight to the destination
    Single(ResolvedStream),
    /// Video-only and audio-only streams, fetched concurrently and muxed
    Separate {
        video: ResolvedStream,
        audio: ResolvedStream,
    },
}

impl DownloadPlan {
    /// Plan for `chosen`, pairing a video-only stream with the best companion audio
    pub fn for_stream(
        descriptor: &VideoDescriptor,
        chosen: &ResolvedStream,
    ) -> Result<Self, MediaError> {
        if chosen.details.has_audio() {
            return Ok(Self::Single(chosen.clone()));
        }

        let audio = descriptor
            .best_audio_for(chosen.details.container)
            .ok_or(MediaError::NoFormatFound)?;
        Ok(Self::Separate {
            video: chosen.clone(),
            audio: audio.clone(),
        })
    }

    /// Sum of the declared lengths of every stream in the plan
    pub fn total_size(&self) -> u64 {
        match self {
            Self::Single(stream) => stream.content_length,
            Self::Separate { video, audio } => video.content_length + audio.content_length,
        }
    }

    /// Container of the final file
    pub fn container(&self) -> Container {
        match self {
            Self::Single(stream) => stream.details.container,
            Self::Separate { video, .. } => video.details.container,
        }
    }

    fn stream_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Separate { .. } => 2,
        }
    }
}

/// Fetches resolved streams to disk with progress and cooperative cancellation
#[derive(Clone)]
pub struct StreamDownloader {
    client: VideoClient,
    config: DownloaderConfig,
    muxer: Muxer,
}

impl StreamDownloader {
    pub fn new() -> Result<Self, MediaError> {
        Self::with_config(DownloaderConfig::default())
    }

    pub fn with_config(config: DownloaderConfig) -> Result<Self, MediaError> {
        let client = VideoClient::with_config(config.http.clone())?;
        let muxer = Muxer::new(config.ffmpeg_path.clone());
        Ok(Self {
            client,
            config,
            muxer,
        })
    }

    /// Replace the muxer built from `ffmpeg_path`
    pub fn with_muxer(mut self, muxer: Muxer) -> Self {
        self.muxer = muxer;
        self
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Execute `plan`, leaving the finished file at `destination`.
    ///
    /// Nothing is ever left at `destination` unless the whole plan succeeded;
    /// partial and temporary files are removed on failure or cancellation.
    pub async fn download(
        &self,
        plan: &DownloadPlan,
        destination: &Path,
        progress: Option<ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        let tracker = ProgressTracker::new(plan.total_size(), progress);
        info!(
            "Downloading {} stream(s), {} total, to {}",
            plan.stream_count(),
            format_bytes(plan.total_size()),
            destination.display()
        );

        let result = match plan {
            DownloadPlan::Single(stream) => {
                self.download_single(stream, destination, &tracker, cancel).await
            }
            DownloadPlan::Separate { video, audio } => {
                self.download_separate(video, audio, destination, &tracker, cancel)
                    .await
            }
        };

        match result {
            Ok(path) => {
                info!(
                    "Download completed: {} in {}",
                    format_bytes(tracker.downloaded()),
                    humantime::format_duration(round_to_millis(tracker.elapsed()))
                );
                Ok(path)
            }
            Err(e) => {
                warn!("Download of {} failed: {}", destination.display(), e);
                Err(e.into_download())
            }
        }
    }

    async fn download_single(
        &self,
        stream: &ResolvedStream,
        destination: &Path,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        let part = part_path(destination);

        let result = self.fetch_to_file(stream, &part, tracker, cancel).await;
        let result = match result {
            Ok(_) => tokio::fs::rename(&part, destination)
                .await
                .map_err(MediaError::from),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            remove_partial(&part).await;
            return Err(e);
        }
        Ok(destination.to_path_buf())
    }

    async fn download_separate(
        &self,
        video: &ResolvedStream,
        audio: &ResolvedStream,
        destination: &Path,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        let video_tmp = self.temp_path(video.details.container)?;
        let audio_tmp = self.temp_path(audio.details.container)?;

        // Either stream failing cancels its sibling through the child token
        let siblings = cancel.child_token();
        let fetched = tokio::try_join!(
            self.fetch_sibling(video, &video_tmp, tracker, &siblings),
            self.fetch_sibling(audio, &audio_tmp, tracker, &siblings),
        );

        let result = match fetched {
            Ok(_) => {
                self.muxer
                    .mux(
                        &video_tmp,
                        &audio_tmp,
                        video.details.container,
                        destination,
                        cancel,
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        discard(video_tmp);
        discard(audio_tmp);
        result
    }

    async fn fetch_sibling(
        &self,
        stream: &ResolvedStream,
        path: &Path,
        tracker: &ProgressTracker,
        siblings: &CancellationToken,
    ) -> Result<u64, MediaError> {
        let result = self.fetch_to_file(stream, path, tracker, siblings).await;
        if result.is_err() {
            siblings.cancel();
        }
        result
    }

    /// Stream one response body into `path`, returning the bytes written
    async fn fetch_to_file(
        &self,
        stream: &ResolvedStream,
        path: &Path,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<u64, MediaError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MediaError::Cancelled),
            response = self.client.get_stream(&stream.url) => response?,
        };

        let mut file = File::create(path).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MediaError::Cancelled),
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk?;

            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            tracker.record(chunk.len() as u64);
        }
        file.flush().await?;

        if written < stream.content_length {
            return Err(MediaError::Download(format!(
                "stream {} ended after {} of {} bytes",
                stream.details.itag, written, stream.content_length
            )));
        }

        debug!("Stream {} finished: {}", stream.details.itag, format_bytes(written));
        Ok(written)
    }

    fn temp_path(&self, container: Container) -> Result<TempPath, MediaError> {
        let dir = self
            .config
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let file = tempfile::Builder::new()
            .prefix("rapid_media")
            .suffix(&format!(".{}", container.extension()))
            .tempfile_in(dir)?;
        Ok(file.into_temp_path())
    }
}

/// `<destination>.part`
fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial download {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

fn discard(path: TempPath) {
    let shown = path.to_path_buf();
    if let Err(e) = path.close() {
        warn!("Could not remove temporary file {}: {}", shown.display(), e);
    }
}

fn round_to_millis(elapsed: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(elapsed.as_millis() as u64)
}
