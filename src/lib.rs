#![forbid(unsafe_code)]

//! Turns title/URL stanzas into a tree of `.strm`/`.nfo`/`.dms.json` stubs
//! that a media-center library scanner can index.

pub mod classify;
pub mod config;
pub mod discovery;
pub mod extract;
pub mod http;
pub mod materialize;
pub mod pipeline;
pub mod resolve;
pub mod stanza;
pub mod text;
