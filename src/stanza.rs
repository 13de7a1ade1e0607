#![forbid(unsafe_code)]

//! Reads stanza files: a title line immediately followed by a URL line.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// One title/URL pair naming a playlist source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    pub title: String,
    pub url: String,
}

/// Stanzas together with the output prefix they are written under.
#[derive(Debug, Clone)]
pub struct StanzaSet {
    pub prefix: String,
    pub stanzas: Vec<Stanza>,
}

/// Reads `source` (a path, or `-` for stdin) and pairs its lines.
///
/// The prefix is `name` when given, otherwise the file name without its
/// `.txt` suffix.
pub fn load_stanzas(source: &str, name: Option<&str>) -> Result<StanzaSet> {
    let prefix = stanza_prefix(source, name)?;
    let lines = if source == "-" {
        info!("Parsing standard input");
        read_lines(io::stdin().lock()).context("reading stanzas from standard input")?
    } else {
        info!(filename = source, "Parsing stanza file");
        let file = File::open(source).with_context(|| format!("opening {source}"))?;
        read_lines(BufReader::new(file)).with_context(|| format!("reading {source}"))?
    };

    Ok(StanzaSet {
        prefix,
        stanzas: pair_lines(&lines),
    })
}

fn stanza_prefix(source: &str, name: Option<&str>) -> Result<String> {
    if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
        return Ok(name.to_string());
    }
    if source == "-" {
        bail!("--name is required when stanzas are read from standard input");
    }
    let file_name = Path::new(source)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.strip_suffix(".txt") {
        Some(stem) if !stem.is_empty() => Ok(stem.to_string()),
        _ => bail!("if --name is not given, the stanza file name must end with .txt: {source}"),
    }
}

fn read_lines(reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        debug!(line = %line, "Scanned line");
        lines.push(line);
    }
    Ok(lines)
}

/// Pairs every `http…` line with the line right before it.
///
/// Repeated URLs keep their first position but take the last title seen.
pub fn pair_lines(lines: &[String]) -> Vec<Stanza> {
    let mut stanzas: Vec<Stanza> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for (index, line) in lines.iter().enumerate() {
        if !line.starts_with("http") || index == 0 {
            continue;
        }
        let title = lines[index - 1].clone();
        match positions.get(line.as_str()) {
            Some(&position) => stanzas[position].title = title,
            None => {
                positions.insert(line.as_str(), stanzas.len());
                stanzas.push(Stanza {
                    title,
                    url: line.clone(),
                });
            }
        }
    }

    stanzas
}
