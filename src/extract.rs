#![forbid(unsafe_code)]

//! Feed fetching and conversion of raw entries into playable items.
//!
//! Feeds from different sources populate wildly different fields, so every
//! item field is filled through an ordered list of fallbacks. Entries that
//! never yield a playback URL are dropped.

use crate::http::Fetch;
use crate::text::strip_tags;
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, error};

const YOUTUBE_PLUGIN_PREFIX: &str = "plugin://plugin.video.youtube/play/?video_id=";
const SVTPLAY_PLUGIN_PREFIX: &str = "plugin://plugin.video.svtplay/?mode=video&id=";

static CHANNEL_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"www\.youtube\.com/channel/([^/?#&]+)").expect("valid channel link pattern")
});
static WATCH_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"www\.youtube\.com/watch\?v=([a-zA-Z0-9_-]+)").expect("valid watch link pattern")
});
static SVTPLAY_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"www\.svtplay\.se(/.*)").expect("valid svtplay link pattern"));
static WATCH_IN_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})").expect("valid watch content pattern")
});
static SHORT_LINK_IN_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"youtu(?:\.be|.b)/([a-zA-Z0-9_-]{11})").expect("valid short link pattern")
});

/// One playable entry, ready to be written as a stub file set.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistItem {
    pub title: String,
    /// Raw `updated` timestamp followed by the title; sorts lexically.
    pub sort_title: String,
    pub description: String,
    pub author: String,
    pub canonical_url: String,
    pub icon_url: String,
    pub playback_url: String,
    /// Empty for sources that are not on the video platform.
    pub video_id: String,
    /// Entry link as published, checked later for nested programs.
    pub source_link: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Playlist {
    pub title: String,
    pub items: Vec<PlaylistItem>,
}

/// Channel ids seen in feed links during one run, mapped to the feed title.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<String, String>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins.
    pub fn record(&mut self, channel_id: &str, name: &str) {
        self.channels
            .insert(channel_id.to_string(), name.to_string());
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.channels
            .iter()
            .map(|(id, name)| (id.as_str(), name.as_str()))
    }
}

/// Where an entry can be played from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTarget {
    pub video_id: String,
    pub playback_url: String,
    pub canonical_url: String,
}

impl PlaybackTarget {
    fn youtube(video_id: &str, canonical_url: String) -> Self {
        Self {
            video_id: video_id.to_string(),
            playback_url: format!("{YOUTUBE_PLUGIN_PREFIX}{video_id}"),
            canonical_url,
        }
    }
}

/// Runs the identifier fallback chain: watch link in `link`, broadcaster
/// link in `link`, watch link in `content`, short link in `content`.
pub fn playback_target(link: &str, content: &str) -> Option<PlaybackTarget> {
    if let Some(id) = first_capture(&WATCH_LINK, link) {
        return Some(PlaybackTarget::youtube(id, link.to_string()));
    }
    if let Some(path) = first_capture(&SVTPLAY_LINK, link) {
        return Some(PlaybackTarget {
            video_id: String::new(),
            playback_url: format!("{SVTPLAY_PLUGIN_PREFIX}{}", urlencoding::encode(path)),
            canonical_url: link.to_string(),
        });
    }
    first_capture(&WATCH_IN_CONTENT, content)
        .or_else(|| first_capture(&SHORT_LINK_IN_CONTENT, content))
        .map(|id| PlaybackTarget::youtube(id, format!("https://www.youtube.com/watch?v={id}")))
}

fn first_capture<'a>(pattern: &Regex, haystack: &'a str) -> Option<&'a str> {
    pattern
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Fetches and parses `url`. Network errors, parse errors and empty feeds
/// are logged and reported as `None`.
pub fn fetch_playlist(
    fetcher: &dyn Fetch,
    url: &str,
    registry: &mut ChannelRegistry,
) -> Option<Playlist> {
    let body = match fetcher.fetch_text(url) {
        Ok(body) => body,
        Err(err) => {
            error!(url, error = %err, "Error fetching feed");
            return None;
        }
    };
    parse_playlist(&body, url, registry)
}

pub fn parse_playlist(body: &str, url: &str, registry: &mut ChannelRegistry) -> Option<Playlist> {
    let feed = match parser::parse(body.as_bytes()) {
        Ok(feed) => feed,
        Err(err) => {
            error!(url, error = %err, "Error parsing feed");
            return None;
        }
    };
    if feed.entries.is_empty() {
        error!(url, "No items in feed");
        return None;
    }
    Some(extract_playlist(&feed, registry))
}

/// Converts every entry of `feed`, keeping feed order.
pub fn extract_playlist(feed: &Feed, registry: &mut ChannelRegistry) -> Playlist {
    let title = feed
        .title
        .as_ref()
        .map(|text| text.content.clone())
        .unwrap_or_default();
    debug!(title = %title, "Parsing feed");

    if let Some(channel_id) = feed
        .links
        .iter()
        .find_map(|link| first_capture(&CHANNEL_LINK, &link.href))
    {
        debug!(channel = channel_id, "Adding channel");
        registry.record(channel_id, &title);
    }

    let items = feed
        .entries
        .iter()
        .filter_map(|entry| extract_item(feed, entry))
        .collect();
    Playlist { title, items }
}

fn extract_item(feed: &Feed, entry: &Entry) -> Option<PlaylistItem> {
    let link = entry_link(entry);
    let Some(target) = playback_target(&link, &entry_body(entry)) else {
        debug!(id = %entry.id, link = %link, "Dropping entry without playable link");
        return None;
    };

    let title = strip_tags(
        &entry
            .title
            .as_ref()
            .map(|text| text.content.clone())
            .unwrap_or_default(),
    );
    let updated = entry
        .updated
        .map(|updated| updated.to_rfc3339())
        .unwrap_or_default();
    let description = entry
        .summary
        .as_ref()
        .map(|text| text.content.clone())
        .filter(|text| !text.is_empty())
        .or_else(|| {
            entry
                .media
                .iter()
                .find_map(|media| media.description.as_ref().map(|text| text.content.clone()))
        })
        .unwrap_or_default();
    let author = entry
        .authors
        .first()
        .map(|person| person.name.clone())
        .unwrap_or_default();

    let item = PlaylistItem {
        sort_title: format!("{updated} {title}"),
        title,
        description: strip_tags(&description),
        author,
        canonical_url: target.canonical_url,
        icon_url: icon_url(feed, entry),
        playback_url: target.playback_url,
        video_id: target.video_id,
        source_link: link,
        published_at: entry.published.or(entry.updated).unwrap_or_else(Utc::now),
    };
    debug!(
        title = %item.title,
        url = %item.canonical_url,
        strm = %item.playback_url,
        "Created playlist item"
    );
    Some(item)
}

/// Alternate (or unlabelled) link first, then any link, then an URL-shaped id.
fn entry_link(entry: &Entry) -> String {
    entry
        .links
        .iter()
        .find(|link| {
            !link.href.trim().is_empty()
                && link
                    .rel
                    .as_deref()
                    .is_none_or(|rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
        })
        .or_else(|| entry.links.iter().find(|link| !link.href.trim().is_empty()))
        .map(|link| link.href.trim().to_string())
        .or_else(|| {
            let id = entry.id.trim();
            (id.starts_with("http://") || id.starts_with("https://")).then(|| id.to_string())
        })
        .unwrap_or_default()
}

/// Embedded content body; feeds without one are scanned through their summary.
fn entry_body(entry: &Entry) -> String {
    entry
        .content
        .as_ref()
        .and_then(|content| content.body.clone())
        .or_else(|| entry.summary.as_ref().map(|text| text.content.clone()))
        .unwrap_or_default()
}

/// Item image, feed image, media thumbnail, image enclosure, in that order.
fn icon_url(feed: &Feed, entry: &Entry) -> String {
    item_image(entry)
        .or_else(|| non_empty(feed.logo.as_ref().map(|image| image.uri.as_str())))
        .or_else(|| media_thumbnail(entry))
        .or_else(|| image_enclosure(entry))
        .unwrap_or_default()
}

fn item_image(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .filter(|link| {
            !link
                .rel
                .as_deref()
                .is_some_and(|rel| rel.eq_ignore_ascii_case("enclosure"))
        })
        .find(|link| is_image_type(link.media_type.as_deref()))
        .and_then(|link| non_empty(Some(link.href.as_str())))
}

fn media_thumbnail(entry: &Entry) -> Option<String> {
    entry
        .media
        .iter()
        .flat_map(|media| media.thumbnails.iter())
        .find_map(|thumbnail| non_empty(Some(thumbnail.image.uri.as_str())))
}

fn image_enclosure(entry: &Entry) -> Option<String> {
    entry
        .media
        .iter()
        .flat_map(|media| media.content.iter())
        .find(|content| {
            content
                .content_type
                .as_ref()
                .is_some_and(|mime| mime.to_string().starts_with("image/"))
        })
        .and_then(|content| non_empty(content.url.as_ref().map(|url| url.as_str())))
        .or_else(|| {
            entry
                .links
                .iter()
                .filter(|link| {
                    link.rel
                        .as_deref()
                        .is_some_and(|rel| rel.eq_ignore_ascii_case("enclosure"))
                })
                .find(|link| is_image_type(link.media_type.as_deref()))
                .and_then(|link| non_empty(Some(link.href.as_str())))
        })
}

fn is_image_type(media_type: Option<&str>) -> bool {
    media_type.is_some_and(|media_type| media_type.starts_with("image/"))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const CHANNEL_ID: &str = "UCabcdefghijklmnopqrstuv";

    pub const YOUTUBE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
 <link rel="self" href="http://www.youtube.com/feeds/videos.xml?channel_id=UCabcdefghijklmnopqrstuv"/>
 <id>yt:channel:abcdefghijklmnopqrstuv</id>
 <title>Example Channel</title>
 <link rel="alternate" href="https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv"/>
 <author>
  <name>Example Channel</name>
  <uri>https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv</uri>
 </author>
 <published>2015-01-01T00:00:00+00:00</published>
 <entry>
  <id>yt:video:dQw4w9WgXcQ</id>
  <yt:videoId>dQw4w9WgXcQ</yt:videoId>
  <title>First &amp; Best: Part 1/2</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v=dQw4w9WgXcQ"/>
  <author>
   <name>Example Channel</name>
   <uri>https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv</uri>
  </author>
  <published>2024-01-02T03:04:05+00:00</published>
  <updated>2024-01-03T00:00:00+00:00</updated>
  <media:group>
   <media:title>First &amp; Best: Part 1/2</media:title>
   <media:content url="https://www.youtube.com/v/dQw4w9WgXcQ?version=3" type="application/x-shockwave-flash" width="640" height="390"/>
   <media:thumbnail url="https://i1.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg" width="480" height="360"/>
   <media:description>A &lt;b&gt;bold&lt;/b&gt; description</media:description>
  </media:group>
 </entry>
 <entry>
  <id>yt:video:9bZkp7q19f0</id>
  <yt:videoId>9bZkp7q19f0</yt:videoId>
  <title>Second</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v=9bZkp7q19f0"/>
  <author>
   <name>Example Channel</name>
  </author>
  <published>2024-03-04T05:06:07+00:00</published>
  <updated>2024-03-05T00:00:00+00:00</updated>
  <media:group>
   <media:title>Second</media:title>
   <media:thumbnail url="https://i1.ytimg.com/vi/9bZkp7q19f0/hqdefault.jpg" width="480" height="360"/>
   <media:description>Plain</media:description>
  </media:group>
 </entry>
 <entry>
  <id>tag:example.com,2024:post</id>
  <title>Not a video</title>
  <link rel="alternate" href="https://example.com/article"/>
  <updated>2024-03-06T00:00:00+00:00</updated>
 </entry>
</feed>
"#;

    pub const FORUM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
 <title>videos</title>
 <id>/r/videos/.rss</id>
 <link rel="alternate" href="https://www.reddit.com/r/videos/"/>
 <updated>2024-02-01T10:00:00+00:00</updated>
 <entry>
  <author><name>/u/poster</name></author>
  <content type="html">&lt;p&gt;look &lt;a href="https://youtu.b/AbCdEfGhIjK"&gt;here&lt;/a&gt;&lt;/p&gt;</content>
  <id>t3_short</id>
  <link href="https://www.reddit.com/r/videos/comments/short/look_here/"/>
  <updated>2024-02-01T10:00:00+00:00</updated>
  <published>2024-02-01T09:00:00+00:00</published>
  <title>Short link post</title>
 </entry>
 <entry>
  <author><name>/u/other</name></author>
  <content type="html">&lt;a href="https://www.youtube.com/watch?v=ZyXwVuTsRqP&amp;t=10"&gt;watch&lt;/a&gt;</content>
  <id>t3_watch</id>
  <link href="https://www.reddit.com/r/videos/comments/watch/watch_this/"/>
  <updated>2024-02-02T10:00:00+00:00</updated>
  <title>Watch link post</title>
 </entry>
 <entry>
  <author><name>/u/text</name></author>
  <content type="html">&lt;p&gt;just text&lt;/p&gt;</content>
  <id>t3_text</id>
  <link href="https://www.reddit.com/r/videos/comments/text/discussion/"/>
  <updated>2024-02-03T10:00:00+00:00</updated>
  <title>Discussion</title>
 </entry>
</feed>
"#;

    pub const EMPTY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
 <title>Nothing here</title>
 <id>urn:empty</id>
 <updated>2024-01-01T00:00:00+00:00</updated>
</feed>
"#;

    /// Broadcaster listing page whose items point at individual programs.
    pub const BROADCASTER_LISTING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
 <channel>
  <title>Barn</title>
  <link>https://www.svtplay.se/barn</link>
  <description>Program for children</description>
  <item>
   <title>Bolibompa</title>
   <link>https://www.svtplay.se/bolibompa</link>
   <description>&lt;p&gt;Kids&lt;/p&gt;</description>
   <pubDate>Tue, 02 Jan 2024 08:00:00 +0000</pubDate>
  </item>
 </channel>
</rss>
"#;

    pub const BROADCASTER_PROGRAM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
 <channel>
  <title>Bolibompa</title>
  <link>https://www.svtplay.se/bolibompa</link>
  <description>Episodes</description>
  <item>
   <title>Episode 1</title>
   <link>https://www.svtplay.se/video/abc123/bolibompa/episode-1</link>
   <description>First</description>
   <pubDate>Wed, 03 Jan 2024 08:00:00 +0000</pubDate>
  </item>
 </channel>
</rss>
"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::http::testing::FakeFetcher;
    use chrono::TimeZone;

    fn parse(body: &str) -> (Option<Playlist>, ChannelRegistry) {
        let mut registry = ChannelRegistry::new();
        let playlist = parse_playlist(body, "https://feed.example/", &mut registry);
        (playlist, registry)
    }

    #[test]
    fn youtube_entries_become_items_in_feed_order() {
        let (playlist, _) = parse(YOUTUBE_FEED);
        let playlist = playlist.unwrap();
        assert_eq!(playlist.title, "Example Channel");
        assert_eq!(playlist.items.len(), 2);

        let first = &playlist.items[0];
        assert_eq!(first.title, "First & Best: Part 1/2");
        assert_eq!(first.video_id, "dQw4w9WgXcQ");
        assert_eq!(
            first.playback_url,
            "plugin://plugin.video.youtube/play/?video_id=dQw4w9WgXcQ"
        );
        assert_eq!(
            first.canonical_url,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(first.author, "Example Channel");
        assert_eq!(
            first.icon_url,
            "https://i1.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
        assert_eq!(first.description, "A bold description");
        assert_eq!(
            first.published_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
        );
        assert!(first.sort_title.ends_with(" First & Best: Part 1/2"));
        assert!(first.sort_title.starts_with("2024-01-03"));

        assert_eq!(playlist.items[1].video_id, "9bZkp7q19f0");
    }

    #[test]
    fn channel_link_is_recorded() {
        let (_, registry) = parse(YOUTUBE_FEED);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.iter().collect::<Vec<_>>(),
            vec![(CHANNEL_ID, "Example Channel")]
        );
    }

    #[test]
    fn content_links_are_used_when_entry_link_is_not_playable() {
        let (playlist, registry) = parse(FORUM_FEED);
        let playlist = playlist.unwrap();
        assert!(registry.is_empty());
        assert_eq!(playlist.items.len(), 2);

        let short = &playlist.items[0];
        assert_eq!(short.video_id, "AbCdEfGhIjK");
        assert_eq!(
            short.playback_url,
            "plugin://plugin.video.youtube/play/?video_id=AbCdEfGhIjK"
        );
        assert_eq!(
            short.canonical_url,
            "https://www.youtube.com/watch?v=AbCdEfGhIjK"
        );
        assert_eq!(
            short.source_link,
            "https://www.reddit.com/r/videos/comments/short/look_here/"
        );

        assert_eq!(playlist.items[1].video_id, "ZyXwVuTsRqP");
        // No published date: falls back to updated.
        assert_eq!(
            playlist.items[1].published_at,
            Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn broadcaster_links_get_plugin_uri_without_video_id() {
        let (playlist, _) = parse(BROADCASTER_LISTING);
        let item = &playlist.unwrap().items[0];
        assert_eq!(item.video_id, "");
        assert_eq!(
            item.playback_url,
            "plugin://plugin.video.svtplay/?mode=video&id=%2Fbolibompa"
        );
        assert_eq!(item.source_link, "https://www.svtplay.se/bolibompa");
        assert_eq!(item.description, "Kids");
        assert_eq!(
            item.published_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn empty_feed_yields_no_playlist() {
        let (playlist, _) = parse(EMPTY_FEED);
        assert!(playlist.is_none());
    }

    #[test]
    fn unparseable_body_yields_no_playlist() {
        let (playlist, _) = parse("this is not a feed");
        assert!(playlist.is_none());
    }

    #[test]
    fn fetch_failure_yields_no_playlist() {
        let fetcher = FakeFetcher::new();
        let mut registry = ChannelRegistry::new();
        assert!(fetch_playlist(&fetcher, "https://missing.example/rss", &mut registry).is_none());
        assert!(fetcher.requested("https://missing.example/rss"));
    }

    #[test]
    fn fallback_chain_order() {
        let watch = playback_target(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/AbCdEfGhIjK",
        )
        .unwrap();
        assert_eq!(watch.video_id, "dQw4w9WgXcQ");

        let content_watch = playback_target(
            "https://forum.example/post",
            "see youtube.com/watch?v=ZyXwVuTsRqP and youtu.be/AbCdEfGhIjK",
        )
        .unwrap();
        assert_eq!(content_watch.video_id, "ZyXwVuTsRqP");

        let short = playback_target("", "https://youtu.be/AbCdEfGhIjK").unwrap();
        assert_eq!(short.video_id, "AbCdEfGhIjK");
    }

    #[test]
    fn dropped_entries_fail_every_strategy() {
        assert!(playback_target("https://example.com/article", "").is_none());
        assert!(playback_target("", "youtu.be/short").is_none());
    }

    #[test]
    fn registry_is_last_write_wins() {
        let mut registry = ChannelRegistry::new();
        registry.record("UC1", "Old");
        registry.record("UC1", "New");
        registry.record("UC2", "Other");
        assert_eq!(
            registry.iter().collect::<Vec<_>>(),
            vec![("UC1", "New"), ("UC2", "Other")]
        );
    }
}
