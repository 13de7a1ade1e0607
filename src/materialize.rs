#![forbid(unsafe_code)]

//! Writes playlists to disk as `.strm`/`.nfo`/`.dms.json` stub file sets.
//!
//! Directory layout:
//!
//! ```text
//! <parent>/<playlist name>/<item title>.strm
//!                         /<item title>.nfo
//!                         /<item title>.dms.json
//! ```
//!
//! File and directory modification times carry content recency: each stub
//! gets its item's publish time, the playlist directory gets the newest item
//! time, and the parent directory only ever moves forward. A scanner can then
//! skip directories whose mtime has not changed.

use crate::extract::PlaylistItem;
use crate::resolve::broadcaster_feed_url;
use crate::text::{escape_xml, sanitize_file_name};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fs::{self, File, FileTimes};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Marks a directory that was created but not yet populated.
pub fn epoch_sentinel() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1)
}

const STRM_EXTENSION: &str = "strm";
const NFO_EXTENSION: &str = "nfo";
const DMS_EXTENSION: &str = "dms.json";
const DMS_MIME_TYPE: &str = "video/mp4";

static PROGRAM_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"www\.svtplay\.se/([^/]+)$").expect("valid program link pattern")
});

#[derive(Debug, Serialize)]
struct DmsDocument<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Resources")]
    resources: Vec<DmsResource>,
}

#[derive(Debug, Serialize)]
struct DmsResource {
    #[serde(rename = "MimeType")]
    mime_type: &'static str,
    #[serde(rename = "Command")]
    command: String,
}

/// Broadcaster program referenced by an item, to be expanded into its own
/// sub-directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedProgram {
    pub title: String,
    pub feed_url: String,
}

#[derive(Debug, Clone)]
pub struct MaterializedPlaylist {
    pub directory: PathBuf,
    pub items_written: usize,
    pub most_recent: Option<DateTime<Utc>>,
    /// Programs to expand next, nested under `directory`.
    pub nested_programs: Vec<NestedProgram>,
}

/// Sanitized directory name for a playlist, or `None` when nothing usable
/// is left (empty, `.` or `..`).
pub fn directory_name(name: &str) -> Option<String> {
    let sanitized = sanitize_file_name(name);
    match sanitized.trim() {
        "" | "." | ".." => None,
        _ => Some(sanitized),
    }
}

/// Writes `items` below `parent/<name>` and updates directory times.
///
/// Any I/O failure aborts the playlist; files already written stay on disk.
pub fn write_playlist(
    parent: &Path,
    name: &str,
    items: &[PlaylistItem],
) -> Result<MaterializedPlaylist> {
    let Some(dir_name) = directory_name(name) else {
        bail!("unusable playlist directory name {name:?} below {}", parent.display());
    };
    let directory = parent.join(dir_name);
    debug!(directory = %directory.display(), "Will create directory");
    fs::create_dir_all(&directory)
        .with_context(|| format!("creating {}", directory.display()))?;
    set_path_time(&directory, epoch_sentinel())?;
    info!(
        directory = %directory.display(),
        items = items.len(),
        "Created directory, will now create playlist items"
    );

    let mut most_recent: Option<DateTime<Utc>> = None;
    let mut nested_programs = Vec::new();

    for item in items {
        let title = sanitize_file_name(&item.title);
        write_item(&directory, &title, name, item)?;

        if most_recent.is_none_or(|current| current < item.published_at) {
            most_recent = Some(item.published_at);
        }

        if let Some(program) = PROGRAM_LINK
            .captures(&item.source_link)
            .and_then(|caps| caps.get(1))
        {
            nested_programs.push(NestedProgram {
                title: title.clone(),
                feed_url: broadcaster_feed_url(program.as_str()),
            });
        }
    }

    if let Some(most_recent) = most_recent {
        let time = SystemTime::from(most_recent);
        set_path_time(&directory, time)?;
        advance_path_time(parent, time)?;
    }

    Ok(MaterializedPlaylist {
        directory,
        items_written: items.len(),
        most_recent,
        nested_programs,
    })
}

fn write_item(directory: &Path, title: &str, tag: &str, item: &PlaylistItem) -> Result<()> {
    let time = SystemTime::from(item.published_at);

    let strm = format!("{}\n", item.playback_url);
    write_stub(&stub_path(directory, title, STRM_EXTENSION), strm.as_bytes(), time)?;

    let nfo = nfo_document(item, tag);
    write_stub(&stub_path(directory, title, NFO_EXTENSION), nfo.as_bytes(), time)?;

    let dms = dms_document(item)?;
    write_stub(&stub_path(directory, title, DMS_EXTENSION), &dms, time)?;
    Ok(())
}

fn stub_path(directory: &Path, title: &str, extension: &str) -> PathBuf {
    directory.join(format!("{title}.{extension}"))
}

/// Kodi-style movie info document.
pub fn nfo_document(item: &PlaylistItem, tag: &str) -> String {
    format!(
        "<?xml version='1.0' encoding='utf-8'?>\n<movie>\n<title>{}</title>\n<sorttitle>{}</sorttitle>\n<plot>{}</plot>\n<thumb>{}</thumb>\n<tag>{}</tag>\n</movie>\n",
        escape_xml(&item.title),
        escape_xml(&item.sort_title),
        escape_xml(&item.description),
        escape_xml(&item.icon_url),
        escape_xml(tag),
    )
}

/// Media-server sidecar describing the single playable resource.
pub fn dms_document(item: &PlaylistItem) -> Result<Vec<u8>> {
    let document = DmsDocument {
        title: &item.title,
        resources: vec![DmsResource {
            mime_type: DMS_MIME_TYPE,
            command: format!("play-stream {}", item.video_id),
        }],
    };
    serde_json::to_vec(&document).context("serializing dms document")
}

/// Creates, writes and closes `path`, then stamps it with `time`.
fn write_stub(path: &Path, contents: &[u8], time: SystemTime) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("writing {}", path.display()))?;
    file.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    file.set_times(file_times(time))
        .with_context(|| format!("setting times on {}", path.display()))?;
    Ok(())
}

fn file_times(time: SystemTime) -> FileTimes {
    FileTimes::new().set_accessed(time).set_modified(time)
}

/// Sets access and modification time of a file or directory.
pub fn set_path_time(path: &Path, time: SystemTime) -> Result<()> {
    File::open(path)
        .and_then(|handle| handle.set_times(file_times(time)))
        .with_context(|| format!("setting times on {}", path.display()))
}

/// Stamps `directory` with the newest modification time among its direct
/// entries and moves its parent forward to match. Used once nested
/// playlists have been written, since creating them bumps the directory to
/// wall-clock time. Missing or empty directories are left alone.
pub fn restamp_directory(directory: &Path) -> Result<Option<SystemTime>> {
    if !directory.is_dir() {
        return Ok(None);
    }
    let mut newest: Option<SystemTime> = None;
    let entries =
        fs::read_dir(directory).with_context(|| format!("listing {}", directory.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("listing {}", directory.display()))?;
        let modified = entry
            .metadata()
            .and_then(|metadata| metadata.modified())
            .with_context(|| format!("reading modification time of {}", entry.path().display()))?;
        if newest.is_none_or(|current| current < modified) {
            newest = Some(modified);
        }
    }

    if let Some(time) = newest {
        set_path_time(directory, time)?;
        if let Some(parent) = directory.parent() {
            advance_path_time(parent, time)?;
        }
        debug!(directory = %directory.display(), "Restamped directory");
    }
    Ok(newest)
}

/// Moves the modification time of `path` forward to `time`, never back.
pub fn advance_path_time(path: &Path, time: SystemTime) -> Result<()> {
    let current = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .with_context(|| format!("reading modification time of {}", path.display()))?;
    if current < time {
        set_path_time(path, time)?;
    }
    Ok(())
}
