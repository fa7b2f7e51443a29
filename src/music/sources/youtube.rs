//! Resolves URLs and search terms through the `yt-dlp` command-line tool.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::is_url;
use crate::music::error::{MusicError, MusicResult};
use crate::music::track::Track;
use crate::music::transport::TrackResolver;

/// `TrackResolver` that shells out to `yt-dlp -j`.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: String,
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
        }
    }
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different executable, e.g. an absolute path to `yt-dlp`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// URLs are handed to yt-dlp as-is, anything else becomes a search for
    /// the first YouTube result.
    pub fn target_for(query: &str) -> String {
        let query = query.trim();
        if is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        }
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requested_by: &str) -> MusicResult<Track> {
        if query.trim().is_empty() {
            return Err(MusicError::Resolution("Empty query".to_string()));
        }

        let target = Self::target_for(query);
        info!("Resolving track metadata for {}", target);

        let output = Command::new(&self.program)
            .args([
                "-j",            // Output as JSON
                "--no-playlist", // Don't process playlists
                "--no-warnings",
                "-f",
                "bestaudio",
                target.as_str(),
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MusicError::Resolution(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} exited with {}: {}", self.program, output.status, stderr.trim());
            return Err(MusicError::Resolution(format!(
                "No playable result for {:?}",
                query
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // A search prints one JSON document per result.
        let first = stdout
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| MusicError::Resolution(format!("No results for {:?}", query)))?;

        Track::from_ytdlp_json(first, requested_by)
    }
}
