//! # rapid-media
//!
//! Resolve video watch pages into directly fetchable streams and download them.
//!
//! ## Features
//!
//! - Watch page payload extraction and format catalog lookup
//! - Signature cipher and throttling parameter decoding in a sandboxed V8 isolate
//! - Decoder functions cached per player script version
//! - Concurrent audio/video download with progress and cancellation
//! - Stream-copy muxing through ffmpeg
//!
//! ## Example
//!
//! ```rust,no_run
//! use rapid_media::{DownloadOptions, Downloader};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     rapid_media::logging::init_logging()?;
//!
//!     let downloader =
//!         Downloader::with_options(DownloadOptions::default().with_output_dir("./downloads"))?;
//!     let video = downloader.resolve("https://www.youtube.com/watch?v=VIDEO_ID").await?;
//!
//!     if let Some(best) = video.video_streams().into_iter().max_by_key(|s| s.details.video_quality) {
//!         let path = downloader
//!             .download(&video, best, None, &CancellationToken::new())
//!             .await?;
//!         println!("Downloaded: {}", path.display());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod download;
pub mod error;
pub mod logging;
pub mod platform;
pub mod utils;

// Re-export main types
pub use self::core::{
    Container, DownloadOptions, Downloader, FormatDetails, Progress, ProgressSink,
    QueuedDownload, ResolvedStream, VideoDescriptor,
};
pub use download::{DownloadPlan, DownloaderConfig, StreamDownloader};
pub use error::{ErrorKind, MediaError};
pub use platform::{HttpClientConfig, PageResolver, ResolverConfig};
pub use utils::{MemoryVideoCache, VideoCache};

/// Result type alias for rapid-media operations
pub type Result<T> = std::result::Result<T, MediaError>;
