//! Caching utilities

use crate::core::video_info::VideoDescriptor;
use moka::future::Cache;
use std::time::Duration;

/// High-performance async cache using moka
pub type AsyncCache<K, V> = Cache<K, V>;

/// Create a new async cache with TTL and max capacity
pub fn new_async_cache_with_capacity<K, V>(ttl: Duration, max_capacity: u64) -> AsyncCache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .time_to_live(ttl)
        .max_capacity(max_capacity)
        .build()
}

/// Store of resolved videos, keyed by video id.
///
/// Writes are idempotent: the first descriptor stored for an id wins.
pub trait VideoCache: Send + Sync {
    fn add_video(&self, video: VideoDescriptor);
    fn get_video(&self, id: &str) -> Option<VideoDescriptor>;
}

/// In-memory [`VideoCache`]
#[derive(Clone)]
pub struct MemoryVideoCache {
    videos: moka::sync::Cache<String, VideoDescriptor>,
}

impl MemoryVideoCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            videos: moka::sync::Cache::builder().max_capacity(max_capacity).build(),
        }
    }
}

impl Default for MemoryVideoCache {
    fn default() -> Self {
        Self::new(256)
    }
}

impl VideoCache for MemoryVideoCache {
    fn add_video(&self, video: VideoDescriptor) {
        self.videos.entry(video.id.clone()).or_insert_with(|| video);
    }

    fn get_video(&self, id: &str) -> Option<VideoDescriptor> {
        self.videos.get(id)
    }
}
