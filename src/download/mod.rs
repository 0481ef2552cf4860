//! Download system

pub mod downloader;
pub mod muxer;
pub mod retry;

pub use downloader::*;
pub use muxer::*;
pub use retry::*;
