use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use local_graph::DocumentChange;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum RawLink {
    /// `[[target]]`, resolved by name against the whole vault.
    Wiki(String),
    /// `[text](path.md)`, relative to the linking document's folder.
    Relative(String),
}

#[derive(Debug, Deserialize)]
pub(super) struct Manifest {
    pub(super) documents: Vec<DocumentChange>,
    #[serde(default)]
    pub(super) active: Option<String>,
}

pub(super) fn parse_manifest(raw: &str) -> Result<Manifest> {
    let manifest: Manifest = serde_json::from_str(raw).context("invalid manifest JSON")?;
    if manifest.documents.iter().any(|document| document.id.trim().is_empty()) {
        return Err(anyhow!("manifest contains a document with an empty id"));
    }
    Ok(manifest)
}

pub(super) fn scan_links(text: &str) -> Vec<RawLink> {
    let mut links = Vec::new();
    let mut in_fence = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        scan_wiki_links(line, &mut links);
        scan_markdown_links(line, &mut links);
    }
    links
}

fn scan_wiki_links(line: &str, links: &mut Vec<RawLink>) {
    let mut rest = line;
    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            break;
        };
        let target = after[..end]
            .split(['|', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        if !target.is_empty() {
            links.push(RawLink::Wiki(target.to_owned()));
        }
        rest = &after[end + 2..];
    }
}

fn scan_markdown_links(line: &str, links: &mut Vec<RawLink>) {
    let mut rest = line;
    while let Some(start) = rest.find("](") {
        let after = &rest[start + 2..];
        let Some(end) = after.find(')') else {
            break;
        };
        let target = after[..end]
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_start_matches('<')
            .trim_end_matches('>');
        rest = &after[end + 1..];

        if target.contains("://") || target.starts_with("mailto:") || target.starts_with('#') {
            continue;
        }
        let path = target.split('#').next().unwrap_or_default();
        if path.ends_with(".md") {
            links.push(RawLink::Relative(path.replace("%20", " ")));
        }
    }
}

/// First level-one heading, used as the document title.
pub(super) fn first_heading(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|heading| heading.trim().to_owned())
        .filter(|heading| !heading.is_empty())
}

/// Joins `target` onto the folder `base_dir` and folds `.`/`..` segments.
/// Returns `None` for paths that climb out of the vault root.
pub(super) fn normalize_relative(base_dir: &str, target: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.split('/').collect::<Vec<_>>(),
        None => base_dir.split('/').chain(target.split('/')).collect(),
    };
    for segment in joined {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    (!segments.is_empty()).then(|| segments.join("/"))
}
