//! Track resolvers that turn user queries into playable `Track`s.

/// Submodule implementing `TrackResolver` on top of the `yt-dlp` CLI.
pub mod youtube;

pub use youtube::YtDlpResolver;

use url::Url;

/// Performs a basic check if the input string is an http(s) URL.
/// Does not validate if the URL is actually reachable or supported.
pub fn is_url(input: &str) -> bool {
    Url::parse(input).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
