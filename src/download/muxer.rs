//! Remux separate audio and video files with ffmpeg

use crate::core::video_info::Container;
use crate::error::MediaError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prefix of the intermediate mux output written next to the destination
const OUTPUT_PREFIX: &str = "rapid_media";

/// Invokes an external remux tool to copy both elementary streams into one container
#[derive(Debug, Clone)]
pub struct Muxer {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl Muxer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the ffmpeg arguments, for running the tool through a wrapper
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Stream-copy arguments; the output lasts as long as the shorter input
    pub fn args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into()];
        args.push(video.into());
        args.push("-i".into());
        args.push(audio.into());
        args.extend(
            ["-map", "0:v", "-map", "1:a", "-c", "copy", "-shortest"]
                .iter()
                .map(OsString::from),
        );
        args.push(output.into());
        args
    }

    /// Mux `video` and `audio` into `destination`.
    ///
    /// The tool writes to a scratch name in the destination directory which is
    /// renamed into place only after a zero exit status. The inputs are left
    /// for the caller to delete.
    pub async fn mux(
        &self,
        video: &Path,
        audio: &Path,
        container: Container,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let output = dir.join(format!(
            "{}{}.{}",
            OUTPUT_PREFIX,
            chrono::Utc::now().timestamp_millis(),
            container.extension()
        ));

        debug!("Muxing {} + {} -> {}", video.display(), audio.display(), output.display());

        let result = self.run(video, audio, &output, cancel).await;
        if let Err(e) = result {
            remove_if_exists(&output).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&output, destination).await {
            remove_if_exists(&output).await;
            return Err(MediaError::Mux(format!(
                "could not move output to {}: {}",
                destination.display(),
                e
            )));
        }

        info!("Muxed into {}", destination.display());
        Ok(destination.to_path_buf())
    }

    async fn run(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), MediaError> {
        let program = self.program.display().to_string();

        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(Self::args(video, audio, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| MediaError::Mux(format!("failed to start {}: {}", program, e)))?;

        let finished = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MediaError::Cancelled),
            finished = child.wait_with_output() => finished,
        };
        let finished =
            finished.map_err(|e| MediaError::Mux(format!("waiting for {}: {}", program, e)))?;

        if finished.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            Err(MediaError::Mux(format!(
                "{} exited with {}: {}",
                program,
                finished.status,
                stderr.trim()
            )))
        }
    }
}

impl Default for Muxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial mux output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}
