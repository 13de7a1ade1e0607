#![forbid(unsafe_code)]

//! Drives stanzas through classification, feed fetching and materialization.
//!
//! Work is kept in an explicit queue instead of recursing: a channel expands
//! into one job per discovered playlist, and a broadcaster listing expands
//! into one job per program its items link to. Spawned jobs go to the front
//! of the queue so output is produced depth-first, and jobs nested deeper
//! than the configured limit are dropped.

use crate::classify::{DiscoverySections, SourceKind, classify};
use crate::config::RuntimeSettings;
use crate::discovery::{ChannelSection, discover_section, resolve_channel_handle};
use crate::extract::{ChannelRegistry, fetch_playlist};
use crate::http::Fetch;
use crate::materialize::{directory_name, restamp_directory, write_playlist};
use crate::resolve::{channel_feed_url, feed_url};
use crate::stanza::StanzaSet;
use crate::text::sanitize_file_name;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, error, info, warn};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub playlists_written: usize,
    pub playlists_skipped: usize,
    pub playlists_failed: usize,
    pub items_written: usize,
    pub channels_discovered: usize,
}

#[derive(Debug)]
enum Job {
    /// Stanza-level URL that still has to be classified.
    Source(SourceJob),
    /// Resolved feed, ready to fetch and write.
    Feed(FeedJob),
    /// Runs after the jobs nested below `directory` and resets its time to
    /// the newest of its contents.
    Restamp { directory: PathBuf, depth: usize },
}

impl Job {
    fn depth(&self) -> usize {
        match self {
            Job::Source(job) => job.depth,
            Job::Feed(job) => job.depth,
            Job::Restamp { depth, .. } => *depth,
        }
    }
}

#[derive(Debug)]
struct SourceJob {
    title: String,
    url: String,
    parent: PathBuf,
    all_sections: bool,
    depth: usize,
}

#[derive(Debug)]
struct FeedJob {
    title: String,
    feed_url: String,
    parent: PathBuf,
    depth: usize,
}

pub struct Pipeline<'a> {
    fetcher: &'a dyn Fetch,
    settings: &'a RuntimeSettings,
    registry: ChannelRegistry,
    queue: VecDeque<Job>,
    summary: RunSummary,
}

impl<'a> Pipeline<'a> {
    pub fn new(fetcher: &'a dyn Fetch, settings: &'a RuntimeSettings) -> Self {
        Self {
            fetcher,
            settings,
            registry: ChannelRegistry::new(),
            queue: VecDeque::new(),
            summary: RunSummary::default(),
        }
    }

    /// Processes every stanza, writing below `<destination>/<prefix>`.
    /// Per-playlist failures are logged and never abort the run.
    pub fn run(mut self, set: &StanzaSet) -> RunSummary {
        let parent = self.settings.destination.join(&set.prefix);
        for stanza in &set.stanzas {
            self.queue.push_back(Job::Source(SourceJob {
                title: stanza.title.clone(),
                url: stanza.url.clone(),
                parent: parent.clone(),
                all_sections: self.settings.channel_playlists,
                depth: 0,
            }));
        }

        while let Some(job) = self.queue.pop_front() {
            match job {
                Job::Source(job) => {
                    self.process_source(job);
                    self.pause();
                }
                Job::Feed(job) => self.process_feed(job),
                Job::Restamp { directory, .. } => self.restamp(&directory),
            }
        }

        for (id, name) in self.registry.iter() {
            debug!(channel = id, name, "Discovered channel");
        }
        self.summary.channels_discovered = self.registry.len();
        info!(
            written = self.summary.playlists_written,
            skipped = self.summary.playlists_skipped,
            failed = self.summary.playlists_failed,
            items = self.summary.items_written,
            channels = self.summary.channels_discovered,
            "Run complete"
        );
        self.summary
    }

    fn pause(&self) {
        if !self.settings.sleep.is_zero() && !self.queue.is_empty() {
            thread::sleep(self.settings.sleep);
        }
    }

    fn process_source(&mut self, job: SourceJob) {
        let title = job.title.trim_matches([' ', '.']).to_string();
        let kind = classify(&job.url);
        debug!(
            title = %title,
            url = %job.url,
            parent = %job.parent.display(),
            kind = kind.label(),
            "Parsing playlist"
        );

        match kind {
            SourceKind::ChannelById { id } => self.expand_channel(&job, title, &id),
            SourceKind::ChannelByHandle { handle } => {
                let page_url = job.url.split('#').next().unwrap_or(&job.url);
                match resolve_channel_handle(self.fetcher, page_url) {
                    Some(id) => {
                        debug!(handle = %handle, channel = %id, "Resolved channel handle");
                        self.expand_channel(&job, title, &id);
                    }
                    None => {
                        warn!(title = %title, url = %job.url, "Skipping unresolved channel handle");
                        self.summary.playlists_skipped += 1;
                    }
                }
            }
            kind => {
                if let Some(feed_url) = feed_url(&kind) {
                    self.enqueue_front(vec![Job::Feed(FeedJob {
                        title,
                        feed_url,
                        parent: job.parent,
                        depth: job.depth,
                    })]);
                }
            }
        }
    }

    /// Expands a channel into its playlists when discovery is enabled and
    /// finds any, otherwise into the channel's own video feed.
    fn expand_channel(&mut self, job: &SourceJob, title: String, channel_id: &str) {
        let sections = DiscoverySections::for_channel(&job.url, job.all_sections);
        let channel_dir = job.parent.join(directory_name(&title).unwrap_or_else(|| {
            warn!(
                url = %job.url,
                channel = channel_id,
                "Blank channel title, naming directory after channel id"
            );
            sanitize_file_name(channel_id)
        }));
        let mut spawned = Vec::new();
        let mut restamps = Vec::new();

        for (enabled, section) in [
            (sections.playlists, ChannelSection::Playlists),
            (sections.releases, ChannelSection::Releases),
        ] {
            if !enabled {
                continue;
            }
            debug!(title = %title, section = section.as_str(), "Parsing channel playlists");
            let section_dir = channel_dir.join(section.as_str());
            let found = discover_section(self.fetcher, channel_id, section, self.settings.sleep);
            if found.is_empty() {
                continue;
            }
            for playlist in found {
                spawned.push(Job::Source(SourceJob {
                    title: playlist.name,
                    url: playlist.url,
                    parent: section_dir.clone(),
                    all_sections: false,
                    depth: job.depth + 1,
                }));
            }
            restamps.push(Job::Restamp {
                directory: section_dir,
                depth: job.depth,
            });
        }

        if spawned.is_empty() {
            self.enqueue_front(vec![Job::Feed(FeedJob {
                title,
                feed_url: channel_feed_url(channel_id),
                parent: job.parent.clone(),
                depth: job.depth,
            })]);
        } else {
            spawned.extend(restamps);
            spawned.push(Job::Restamp {
                directory: channel_dir,
                depth: job.depth,
            });
            self.enqueue_front(spawned);
        }
    }

    fn process_feed(&mut self, job: FeedJob) {
        info!(title = %job.title, url = %job.feed_url, "Parsing playlist");
        let Some(playlist) = fetch_playlist(self.fetcher, &job.feed_url, &mut self.registry)
        else {
            debug!(title = %job.title, "Skipping playlist");
            self.summary.playlists_skipped += 1;
            return;
        };

        let name = if directory_name(&job.title).is_some() {
            job.title.clone()
        } else if directory_name(&playlist.title).is_some() {
            warn!(url = %job.feed_url, feed = %playlist.title, "Blank playlist title, using feed title");
            playlist.title.clone()
        } else {
            warn!(url = %job.feed_url, "Skipping playlist without a usable name");
            self.summary.playlists_skipped += 1;
            return;
        };

        debug!(title = %name, feed = %playlist.title, "Writing playlist");
        match write_playlist(&job.parent, &name, &playlist.items) {
            Ok(written) => {
                self.summary.playlists_written += 1;
                self.summary.items_written += written.items_written;
                info!(
                    directory = %written.directory.display(),
                    items = written.items_written,
                    most_recent = ?written.most_recent,
                    "Wrote playlist"
                );
                let mut nested: Vec<Job> = written
                    .nested_programs
                    .into_iter()
                    .map(|program| {
                        Job::Feed(FeedJob {
                            title: program.title,
                            feed_url: program.feed_url,
                            parent: written.directory.clone(),
                            depth: job.depth + 1,
                        })
                    })
                    .collect();
                if !nested.is_empty() {
                    nested.push(Job::Restamp {
                        directory: written.directory.clone(),
                        depth: job.depth,
                    });
                }
                self.enqueue_front(nested);
            }
            Err(err) => {
                error!(
                    title = %job.title,
                    url = %job.feed_url,
                    error = %format!("{err:#}"),
                    "Error writing playlist"
                );
                self.summary.playlists_failed += 1;
            }
        }
    }

    fn restamp(&self, directory: &Path) {
        if let Err(err) = restamp_directory(directory) {
            error!(
                directory = %directory.display(),
                error = %format!("{err:#}"),
                "Error restamping directory"
            );
        }
    }

    /// Queues `jobs` ahead of pending work, keeping their order.
    fn enqueue_front(&mut self, jobs: Vec<Job>) {
        let max_depth = self.settings.max_depth;
        for job in jobs.into_iter().rev() {
            if job.depth() > max_depth {
                warn!(depth = job.depth(), max_depth, job = ?job, "Dropping job nested too deep");
                continue;
            }
            self.queue.push_front(job);
        }
    }
}
