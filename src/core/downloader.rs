//! Main downloader implementation

use crate::core::progress::ProgressSink;
use crate::core::video_info::{QueuedDownload, ResolvedStream, VideoDescriptor};
use crate::download::downloader::{DownloadPlan, DownloaderConfig, StreamDownloader};
use crate::error::MediaError;
use crate::platform::evaluator::EvaluatorFactory;
use crate::platform::resolver::{PageResolver, ResolverConfig};
use crate::utils::cache::{MemoryVideoCache, VideoCache};
use crate::utils::filename::to_safe_filename;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Main downloader configuration
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Directory that receives finished files
    pub output_dir: PathBuf,
    pub resolver: ResolverConfig,
    pub downloader: DownloaderConfig,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            resolver: ResolverConfig::default(),
            downloader: DownloaderConfig::default(),
        }
    }
}

impl DownloadOptions {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_downloader(mut self, downloader: DownloaderConfig) -> Self {
        self.downloader = downloader;
        self
    }
}

/// Resolves pages into videos and downloads chosen streams
pub struct Downloader {
    options: DownloadOptions,
    resolver: PageResolver,
    streams: StreamDownloader,
    cache: Arc<dyn VideoCache>,
}

impl Downloader {
    pub fn new() -> Result<Self, MediaError> {
        Self::with_options(DownloadOptions::default())
    }

    pub fn with_options(options: DownloadOptions) -> Result<Self, MediaError> {
        let resolver = PageResolver::with_config(options.resolver.clone())?;
        let streams = StreamDownloader::with_config(options.downloader.clone())?;
        Ok(Self {
            options,
            resolver,
            streams,
            cache: Arc::new(MemoryVideoCache::default()),
        })
    }

    /// Use a caller supplied video cache
    pub fn with_cache(mut self, cache: Arc<dyn VideoCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_evaluator_factory(mut self, factory: EvaluatorFactory) -> Self {
        self.resolver = self.resolver.with_evaluator_factory(factory);
        self
    }

    pub fn with_stream_downloader(mut self, streams: StreamDownloader) -> Self {
        self.streams = streams;
        self
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    pub fn resolver(&self) -> &PageResolver {
        &self.resolver
    }

    /// Resolve a watch page and register the result with the video cache.
    ///
    /// Always returns the freshly resolved descriptor; the cache keeps the
    /// first one stored for the id.
    pub async fn resolve(&self, page_url: &str) -> Result<VideoDescriptor, MediaError> {
        let video = self.resolver.resolve(page_url).await?;
        self.cache.add_video(video.clone());
        Ok(video)
    }

    /// A previously resolved video
    pub fn cached(&self, video_id: &str) -> Option<VideoDescriptor> {
        self.cache.get_video(video_id)
    }

    /// Build the hand-off record for stream `itag` of a cached video
    pub fn queue(&self, video_id: &str, itag: u32) -> Option<QueuedDownload> {
        let video = self.cache.get_video(video_id)?;
        let selected = video.stream(itag)?.clone();
        debug!("Queued {} stream {}", video_id, itag);
        Some(QueuedDownload { video, selected })
    }

    /// Final path for `chosen` of `descriptor`
    pub fn destination_for(&self, descriptor: &VideoDescriptor, chosen: &ResolvedStream) -> PathBuf {
        self.options
            .output_dir
            .join(to_safe_filename(&descriptor.title, chosen.details.container))
    }

    /// Download `chosen`, muxing in the best companion audio when it has none
    pub async fn download(
        &self,
        descriptor: &VideoDescriptor,
        chosen: &ResolvedStream,
        progress: Option<ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        let plan = DownloadPlan::for_stream(descriptor, chosen)?;
        let destination = self.destination_for(descriptor, chosen);

        info!(
            "Downloading \"{}\" as {} ({})",
            descriptor.title,
            chosen.details.quality_label(),
            plan.container()
        );
        self.streams
            .download(&plan, &destination, progress, cancel)
            .await
    }

    pub async fn download_queued(
        &self,
        queued: &QueuedDownload,
        progress: Option<ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        self.download(&queued.video, &queued.selected, progress, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Server, ServerGuard};
    use serde_json::json;
    use tempfile::tempdir;

    const PLAYER_PATH: &str = "/s/player/0badc0de/player_ias.vflset/en_US/base.js";

    fn watch_page(server: &ServerGuard, title: &str) -> String {
        let payload = json!({
            "videoDetails": {"videoId": "vid1", "title": title},
            "streamingData": {
                "adaptiveFormats": [
                    {"itag": 37, "contentLength": "11", "url": format!("{}/v37", server.url())},
                    {"itag": 137, "contentLength": "4", "url": format!("{}/v137", server.url())}
                ]
            }
        });
        format!(
            r#"<html><script src="{}"></script><script>var ytInitialPlayerResponse = {};</script></html>"#,
            PLAYER_PATH, payload
        )
    }

    async fn serve_page(server: &mut ServerGuard, path: &str, title: &str) -> mockito::Mock {
        let page = watch_page(server, title);
        server.mock("GET", path).with_body(page).create_async().await
    }

    fn downloader(output_dir: &std::path::Path) -> Downloader {
        let factory: EvaluatorFactory =
            Arc::new(|| Err(MediaError::Evaluation("no script needed".to_string())));
        Downloader::with_options(DownloadOptions::default().with_output_dir(output_dir))
            .unwrap()
            .with_evaluator_factory(factory)
    }

    #[tokio::test]
    async fn test_resolve_returns_fresh_descriptor_and_caches_first() {
        let mut server = Server::new_async().await;
        let _first = serve_page(&mut server, "/first", "First title").await;
        let _second = serve_page(&mut server, "/second", "Second title").await;
        let _player = server.mock("GET", PLAYER_PATH).with_body("").create_async().await;

        let out = tempdir().unwrap();
        let downloader = downloader(out.path());

        let first = downloader
            .resolve(&format!("{}/first", server.url()))
            .await
            .unwrap();
        let second = downloader
            .resolve(&format!("{}/second", server.url()))
            .await
            .unwrap();

        assert_eq!(first.title, "First title");
        assert_eq!(second.title, "Second title");
        assert_eq!(downloader.cached("vid1").unwrap().title, "First title");
    }

    #[tokio::test]
    async fn test_queue_and_download_combined_stream() {
        let mut server = Server::new_async().await;
        let _page = serve_page(&mut server, "/watch", "A/B: test").await;
        let _player = server.mock("GET", PLAYER_PATH).with_body("").create_async().await;
        let _media = server
            .mock("GET", "/v37")
            .with_body("hello world")
            .create_async()
            .await;

        let out = tempdir().unwrap();
        let downloader = downloader(out.path());
        downloader
            .resolve(&format!("{}/watch", server.url()))
            .await
            .unwrap();

        assert!(downloader.queue("vid1", 22).is_none());
        assert!(downloader.queue("missing", 37).is_none());
        let queued = downloader.queue("vid1", 37).unwrap();

        let path = downloader
            .download_queued(&queued, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(path, out.path().join("A_B_ test.mp4"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_video_only_without_audio_is_rejected() {
        let mut server = Server::new_async().await;
        let _page = serve_page(&mut server, "/watch", "Silent").await;
        let _player = server.mock("GET", PLAYER_PATH).with_body("").create_async().await;

        let out = tempdir().unwrap();
        let downloader = downloader(out.path());
        let video = downloader
            .resolve(&format!("{}/watch", server.url()))
            .await
            .unwrap();
        let chosen = video.stream(137).unwrap().clone();

        let err = downloader
            .download(&video, &chosen, None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::NoFormatFound));
        assert!(std::fs::read_dir(out.path()).unwrap().next().is_none());
    }
}
