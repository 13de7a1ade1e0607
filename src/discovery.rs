#![forbid(unsafe_code)]

//! Scrapes channel pages for nested playlists and canonical channel ids.
//!
//! Every failure here is soft: an unreachable page or a page without matches
//! simply yields nothing, and the caller falls back to the plain channel feed.

use crate::http::Fetch;
use crate::resolve::{channel_section_url, playlist_page_url};
use crate::text::unescape_html;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

static PLAYLISTS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""playlistId":"(PL[a-zA-Z0-9_-]{16,32})""#).expect("valid playlists pattern")
});
static RELEASES_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""playlistId":"(OL[a-zA-Z0-9_-]{39})""#).expect("valid releases pattern")
});
static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<title>(.*?)(?:- YouTube)?</title>").expect("valid title pattern")
});
static CHANNEL_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""channelId":"(UC[a-zA-Z0-9_-]{22})""#,
        r#"itemprop="channelId" content="(UC[a-zA-Z0-9_-]{22})""#,
        r#"youtube\.com/channel/(UC[a-zA-Z0-9_-]{22})"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid channel id pattern"))
    .collect()
});

/// Channel sub-page holding a family of playlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSection {
    Playlists,
    Releases,
}

impl ChannelSection {
    /// Path segment of the channel page, also used as the output directory.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelSection::Playlists => "playlists",
            ChannelSection::Releases => "releases",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            ChannelSection::Playlists => &PLAYLISTS_PATTERN,
            ChannelSection::Releases => &RELEASES_PATTERN,
        }
    }
}

/// Playlist found on a channel page, with the name recovered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlaylist {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Returns the sorted, de-duplicated playlist ids listed in `section` of the
/// channel.
pub fn discover_playlist_ids(
    fetcher: &dyn Fetch,
    channel_id: &str,
    section: ChannelSection,
) -> Vec<String> {
    let url = channel_section_url(channel_id, section.as_str());
    let body = match fetcher.fetch_text(&url) {
        Ok(body) => body,
        Err(err) => {
            error!(url = %url, error = %err, "Error fetching channel section");
            return Vec::new();
        }
    };

    let ids: BTreeSet<String> = section
        .pattern()
        .captures_iter(&body)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect();
    debug!(url = %url, count = ids.len(), "Scanned channel section");
    ids.into_iter().collect()
}

/// Reads the playlist page title, minus the trailing site name.
pub fn playlist_name(fetcher: &dyn Fetch, playlist_id: &str) -> Option<String> {
    let url = playlist_page_url(playlist_id);
    let body = match fetcher.fetch_text(&url) {
        Ok(body) => body,
        Err(err) => {
            error!(url = %url, error = %err, "Error fetching playlist page");
            return None;
        }
    };

    let name = TITLE_PATTERN
        .captures(&body)
        .and_then(|caps| caps.get(1))
        .map(|m| unescape_html(m.as_str()).trim().to_string())
        .filter(|name| !name.is_empty());
    if name.is_none() {
        error!(url = %url, "Could not find title match for playlist");
    }
    name
}

/// Discovers and names every playlist in `section`, pausing `delay` after
/// each name lookup. Unnamed playlists are labelled with their id.
pub fn discover_section(
    fetcher: &dyn Fetch,
    channel_id: &str,
    section: ChannelSection,
    delay: Duration,
) -> Vec<DiscoveredPlaylist> {
    discover_playlist_ids(fetcher, channel_id, section)
        .into_iter()
        .map(|id| {
            let name = playlist_name(fetcher, &id).unwrap_or_else(|| id.clone());
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            DiscoveredPlaylist {
                url: playlist_page_url(&id),
                name,
                id,
            }
        })
        .collect()
}

/// Looks up the canonical `UC…` id behind a `/c/<handle>` or `/@<handle>`
/// channel URL.
pub fn resolve_channel_handle(fetcher: &dyn Fetch, handle_url: &str) -> Option<String> {
    let body = match fetcher.fetch_text(handle_url) {
        Ok(body) => body,
        Err(err) => {
            error!(url = handle_url, error = %err, "Error fetching channel handle page");
            return None;
        }
    };
    let id = CHANNEL_ID_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(&body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    });
    if id.is_none() {
        warn!(url = handle_url, "No channel id found on handle page");
    }
    id
}
