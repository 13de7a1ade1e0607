#![forbid(unsafe_code)]

//! Feed URL templates for each source kind.

use crate::classify::SourceKind;

pub fn broadcaster_feed_url(category: &str) -> String {
    format!("https://www.svtplay.se/{category}/rss.xml")
}

pub fn channel_feed_url(channel_id: &str) -> String {
    format!("https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}")
}

pub fn user_feed_url(user: &str) -> String {
    format!("https://www.youtube.com/feeds/videos.xml?user={user}")
}

pub fn playlist_feed_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/feeds/videos.xml?playlist_id={playlist_id}")
}

pub fn forum_feed_url(name: &str) -> String {
    format!("https://www.reddit.com/r/{name}/.rss")
}

/// Page listing a single playlist; also the stanza URL handed to sub-playlists.
pub fn playlist_page_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={playlist_id}")
}

/// Channel sub-page such as `playlists` or `releases`.
pub fn channel_section_url(channel_id: &str, section: &str) -> String {
    format!("https://www.youtube.com/channel/{channel_id}/{section}")
}

/// Returns the syndication feed for `kind`, or `None` for a channel handle
/// that still has to be resolved to an id.
pub fn feed_url(kind: &SourceKind) -> Option<String> {
    match kind {
        SourceKind::BroadcasterProgram { category } => Some(broadcaster_feed_url(category)),
        SourceKind::ChannelById { id } => Some(channel_feed_url(id)),
        SourceKind::ChannelByHandle { .. } => None,
        SourceKind::UserFeed { user } => Some(user_feed_url(user)),
        SourceKind::ExplicitPlaylist { playlist_id } => Some(playlist_feed_url(playlist_id)),
        SourceKind::ForumCommunity { name } => Some(forum_feed_url(name)),
        SourceKind::Generic { url } => Some(url.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;

    #[test]
    fn templates_substitute_identifier() {
        assert_eq!(
            feed_url(&classify("https://www.svtplay.se/barn/rss.xml")).unwrap(),
            "https://www.svtplay.se/barn/rss.xml"
        );
        assert_eq!(
            feed_url(&classify("https://www.youtube.com/channel/UCxyz")).unwrap(),
            "https://www.youtube.com/feeds/videos.xml?channel_id=UCxyz"
        );
        assert_eq!(
            feed_url(&classify("https://www.youtube.com/user/someone")).unwrap(),
            "https://www.youtube.com/feeds/videos.xml?user=someone"
        );
        assert_eq!(
            feed_url(&classify("https://www.youtube.com/playlist?list=PLabc")).unwrap(),
            "https://www.youtube.com/feeds/videos.xml?playlist_id=PLabc"
        );
        assert_eq!(
            feed_url(&classify("https://old.reddit.com/r/videos")).unwrap(),
            "https://www.reddit.com/r/videos/.rss"
        );
    }

    #[test]
    fn generic_url_passes_through() {
        let url = "https://example.com/feed.atom";
        assert_eq!(feed_url(&classify(url)).unwrap(), url);
    }

    #[test]
    fn handle_needs_resolution() {
        assert!(feed_url(&classify("https://www.youtube.com/c/handle")).is_none());
    }
}
