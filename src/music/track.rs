//! Defines `Track`, the resolved and playable description of one audio item,
//! and the conversion from `yt-dlp --dump-json` output.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{MusicError, MusicResult};

/// Resolved metadata for one playable audio item.
///
/// Tracks are created by a resolver and handed around by value; nothing in the
/// session machinery mutates one after it has been queued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    /// The title of the track.
    pub title: String,
    /// The URL the player streams from.
    pub url: String,
    /// URL to a thumbnail image for the track, if available.
    pub thumbnail: Option<String>,
    /// The duration of the track. Zero for live streams.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// The name of the user who requested the track.
    pub requested_by: String,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>, requested_by: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            thumbnail: None,
            duration: Duration::ZERO,
            requested_by: requested_by.into(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Builds a `Track` from one JSON document printed by `yt-dlp -j`.
    ///
    /// `webpage_url` is preferred over the raw media `url` because the player
    /// re-runs extraction right before streaming, and media URLs expire.
    pub fn from_ytdlp_json(raw: &str, requested_by: impl Into<String>) -> MusicResult<Track> {
        let json: serde_json::Value = serde_json::from_str(raw.trim()).map_err(|e| {
            MusicError::Resolution(format!("Failed to parse video metadata: {}", e))
        })?;

        let url = json["webpage_url"]
            .as_str()
            .or_else(|| json["url"].as_str())
            .ok_or_else(|| MusicError::Resolution("Metadata has no playable URL".to_string()))?;

        let title = json["title"].as_str().unwrap_or("Unknown Title");

        let duration = json["duration"]
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or_default();

        Ok(Track {
            title: title.to_string(),
            url: url.to_string(),
            thumbnail: json["thumbnail"].as_str().map(str::to_string),
            duration,
            requested_by: requested_by.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_ytdlp_output() {
        let raw = r#"{
            "title": "Never Gonna Give You Up",
            "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "url": "https://rr1---sn.googlevideo.com/videoplayback?expire=1",
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
            "duration": 212.0
        }"#;

        let track = Track::from_ytdlp_json(raw, "charles").unwrap();

        assert_eq!(track.title, "Never Gonna Give You Up");
        assert_eq!(track.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(track.duration, Duration::from_secs(212));
        assert_eq!(track.requested_by, "charles");
        assert!(track.thumbnail.is_some());
    }

    #[test]
    fn falls_back_to_media_url_and_zero_duration() {
        let raw = r#"{"title": "Live radio", "url": "https://example.com/stream.mp3"}"#;

        let track = Track::from_ytdlp_json(raw, "dj").unwrap();

        assert_eq!(track.url, "https://example.com/stream.mp3");
        assert_eq!(track.duration, Duration::ZERO);
        assert_eq!(track.thumbnail, None);
    }

    #[test]
    fn rejects_output_without_url() {
        let err = Track::from_ytdlp_json(r#"{"title": "ghost"}"#, "dj").unwrap_err();
        assert_matches!(err, MusicError::Resolution(_));
    }

    #[test]
    fn rejects_garbage() {
        let err = Track::from_ytdlp_json("ERROR: no results", "dj").unwrap_err();
        assert_matches!(err, MusicError::Resolution(msg) if msg.contains("parse"));
    }
}
