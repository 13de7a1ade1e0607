#![forbid(unsafe_code)]

//! Maps arbitrary source URLs onto the kind of feed they stand for.
//!
//! Rules are evaluated in a fixed priority order and the first matching
//! pattern wins. Anything unmatched is treated as a feed URL in its own right,
//! so classification never fails.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Source type of a stanza URL together with the identifier pulled from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// `www.svtplay.se/<category>/rss.xml`
    BroadcasterProgram { category: String },
    /// `youtube.com/channel/<id>`
    ChannelById { id: String },
    /// `youtube.com/c/<handle>` or `youtube.com/@<handle>`; needs a page fetch
    /// before it can be turned into a feed.
    ChannelByHandle { handle: String },
    /// `youtube.com/user/<user>`
    UserFeed { user: String },
    /// `youtube.com/playlist?list=<id>`
    ExplicitPlaylist { playlist_id: String },
    /// `reddit.com/r/<name>`
    ForumCommunity { name: String },
    /// Anything else; the URL itself is the feed.
    Generic { url: String },
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::BroadcasterProgram { .. } => "broadcaster program",
            SourceKind::ChannelById { .. } => "channel",
            SourceKind::ChannelByHandle { .. } => "channel handle",
            SourceKind::UserFeed { .. } => "user",
            SourceKind::ExplicitPlaylist { .. } => "playlist",
            SourceKind::ForumCommunity { .. } => "forum community",
            SourceKind::Generic { .. } => "generic feed",
        }
    }
}

struct ClassifyRule {
    pattern: Regex,
    build: fn(&Captures<'_>) -> SourceKind,
}

impl ClassifyRule {
    fn new(pattern: &str, build: fn(&Captures<'_>) -> SourceKind) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("valid classification pattern"),
            build,
        }
    }
}

fn capture(caps: &Captures<'_>) -> String {
    caps.get(1)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Ordered rule table; position is priority.
static RULES: LazyLock<Vec<ClassifyRule>> = LazyLock::new(|| {
    vec![
        ClassifyRule::new(r"www\.svtplay\.se/(.+)/rss\.xml", |caps| {
            SourceKind::BroadcasterProgram {
                category: capture(caps),
            }
        }),
        ClassifyRule::new(r"youtube\.com/channel/([^/?#&]+)", |caps| {
            SourceKind::ChannelById { id: capture(caps) }
        }),
        ClassifyRule::new(r"youtube\.com/(?:c/|@)([^/?#&]+)", |caps| {
            SourceKind::ChannelByHandle {
                handle: capture(caps),
            }
        }),
        ClassifyRule::new(r"youtube\.com/user/([^/?#&]+)", |caps| SourceKind::UserFeed {
            user: capture(caps),
        }),
        ClassifyRule::new(r"youtube\.com/playlist\?list=([^&#]+)", |caps| {
            SourceKind::ExplicitPlaylist {
                playlist_id: capture(caps),
            }
        }),
        ClassifyRule::new(r"reddit\.com/r/([^/?#&]+)", |caps| {
            SourceKind::ForumCommunity {
                name: capture(caps),
            }
        }),
    ]
});

static FRAGMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([^#]+)$").expect("valid fragment pattern"));

pub fn classify(url: &str) -> SourceKind {
    RULES
        .iter()
        .find_map(|rule| rule.pattern.captures(url).map(|caps| (rule.build)(&caps)))
        .unwrap_or_else(|| SourceKind::Generic {
            url: url.to_string(),
        })
}

/// Channel sub-pages that can be scraped for nested playlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySections {
    pub playlists: bool,
    pub releases: bool,
}

impl DiscoverySections {
    /// Combines the `--channel-playlists` flag with a `#p`/`#r` URL hint.
    /// Either source enables a section.
    pub fn for_channel(url: &str, all_sections: bool) -> Self {
        let fragment = FRAGMENT_PATTERN
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or("");
        Self {
            playlists: all_sections || fragment.contains('p'),
            releases: all_sections || fragment.contains('r'),
        }
    }

    pub fn any(&self) -> bool {
        self.playlists || self.releases
    }
}
