use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::util::title_from_id;

/// A host-reported document change: the full outgoing link list of one document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DocumentChange {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

impl DocumentChange {
    pub fn new(id: impl Into<String>, links: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: id.into(),
            title: None,
            links: links.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub links: Vec<String>,
}

/// What a single index update touched: the document itself and every link
/// target that was added to or dropped from its link list. A document that
/// appears (new, or back after removal) also touches every document linking
/// to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mutation {
    pub id: String,
    pub affected: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LinkIndex {
    documents: HashMap<String, DocumentRecord>,
    backlinks: HashMap<String, Vec<String>>,
    removed: HashSet<String>,
    revision: u64,
}

impl LinkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_document(
        &mut self,
        id: &str,
        links: impl IntoIterator<Item = impl Into<String>>,
    ) -> Mutation {
        self.apply_change(DocumentChange::new(id, links))
    }

    pub fn apply_change(&mut self, change: DocumentChange) -> Mutation {
        let DocumentChange { id, title, links } = change;

        let mut seen = HashSet::with_capacity(links.len());
        let mut next_links = Vec::with_capacity(links.len());
        for link in links {
            if link.is_empty() {
                continue;
            }
            if seen.insert(link.clone()) {
                next_links.push(link);
            }
        }

        let previous = self.documents.remove(&id);
        let previous_links = previous
            .as_ref()
            .map(|record| record.links.as_slice())
            .unwrap_or_default();
        let previous_set = previous_links.iter().map(String::as_str).collect::<HashSet<_>>();

        let mut affected = Vec::new();
        for stale in previous_links {
            if !seen.contains(stale) {
                self.unlink_backlink(stale, &id);
                affected.push(stale.clone());
            }
        }
        for target in &next_links {
            if !previous_set.contains(target.as_str()) {
                self.backlinks
                    .entry(target.clone())
                    .or_default()
                    .push(id.clone());
                self.removed.remove(target);
                affected.push(target.clone());
            }
        }

        if previous.is_none() {
            for source in self.backlinks(&id) {
                if *source != id && !affected.contains(source) {
                    affected.push(source.clone());
                }
            }
        }

        self.removed.remove(&id);
        let title = title
            .or_else(|| previous.map(|record| record.title))
            .unwrap_or_else(|| title_from_id(&id).to_owned());
        self.documents.insert(
            id.clone(),
            DocumentRecord {
                id: id.clone(),
                title,
                links: next_links,
            },
        );
        self.revision = self.revision.wrapping_add(1);

        Mutation { id, affected }
    }

    /// Drops the record and tombstones the id. Links other documents hold
    /// towards it stay recorded; the extractor skips them while the id is
    /// removed.
    pub fn remove_document(&mut self, id: &str) -> Option<Mutation> {
        let record = self.documents.remove(id)?;
        for target in &record.links {
            self.unlink_backlink(target, id);
        }
        self.removed.insert(id.to_owned());
        self.revision = self.revision.wrapping_add(1);

        Some(Mutation {
            id: id.to_owned(),
            affected: record.links,
        })
    }

    fn unlink_backlink(&mut self, target: &str, source: &str) {
        if let Some(sources) = self.backlinks.get_mut(target) {
            sources.retain(|candidate| candidate != source);
            if sources.is_empty() {
                self.backlinks.remove(target);
            }
        }
    }

    pub fn links(&self, id: &str) -> &[String] {
        self.documents
            .get(id)
            .map(|record| record.links.as_slice())
            .unwrap_or_default()
    }

    pub fn backlinks(&self, id: &str) -> &[String] {
        self.backlinks
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn document(&self, id: &str) -> Option<&DocumentRecord> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    pub fn is_removed(&self, id: &str) -> bool {
        self.removed.contains(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids = self.documents.keys().map(String::as_str).collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_dedups_links_in_first_occurrence_order() {
        let mut index = LinkIndex::new();
        index.upsert_document("a.md", ["c.md", "b.md", "c.md"]);

        assert_eq!(index.links("a.md"), ["c.md", "b.md"]);
        assert_eq!(index.backlinks("c.md"), ["a.md"]);
        assert_eq!(index.document("a.md").map(|d| d.title.as_str()), Some("a"));
    }

    #[test]
    fn upsert_replaces_links_and_reports_the_difference() {
        let mut index = LinkIndex::new();
        index.upsert_document("a.md", ["b.md", "c.md"]);
        let mutation = index.upsert_document("a.md", ["c.md", "d.md"]);

        assert_eq!(mutation.id, "a.md");
        assert_eq!(mutation.affected, ["b.md", "d.md"]);
        assert!(index.backlinks("b.md").is_empty());
        assert_eq!(index.backlinks("d.md"), ["a.md"]);
    }

    #[test]
    fn backlinks_keep_insertion_order() {
        let mut index = LinkIndex::new();
        index.upsert_document("z.md", ["hub.md"]);
        index.upsert_document("a.md", ["hub.md"]);
        index.upsert_document("m.md", ["hub.md"]);

        assert_eq!(index.backlinks("hub.md"), ["z.md", "a.md", "m.md"]);
    }

    #[test]
    fn remove_keeps_incoming_links_but_tombstones_the_id() {
        let mut index = LinkIndex::new();
        index.upsert_document("a.md", ["b.md"]);
        index.upsert_document("b.md", ["c.md"]);

        let mutation = index.remove_document("b.md").expect("b.md was indexed");
        assert_eq!(mutation.affected, ["c.md"]);
        assert!(!index.contains("b.md"));
        assert!(index.is_removed("b.md"));
        assert_eq!(index.links("a.md"), ["b.md"]);
        assert!(index.backlinks("c.md").is_empty());

        assert!(index.remove_document("b.md").is_none());
    }

    #[test]
    fn fresh_link_revives_a_removed_target() {
        let mut index = LinkIndex::new();
        index.upsert_document("b.md", Vec::<String>::new());
        index.remove_document("b.md");
        index.upsert_document("x.md", ["b.md"]);

        assert!(!index.is_removed("b.md"));
    }

    #[test]
    fn recreated_document_reports_its_referrers() {
        let mut index = LinkIndex::new();
        index.upsert_document("a.md", ["b.md"]);
        index.upsert_document("b.md", ["c.md"]);
        index.remove_document("b.md");

        let mutation = index.upsert_document("b.md", Vec::<String>::new());
        assert_eq!(mutation.affected, ["a.md"]);
        assert!(!index.is_removed("b.md"));

        let update = index.upsert_document("b.md", ["a.md"]);
        assert_eq!(update.affected, ["a.md"]);
        let unchanged = index.upsert_document("b.md", ["a.md"]);
        assert!(unchanged.affected.is_empty());
    }

    #[test]
    fn titles_survive_link_only_updates() {
        let mut index = LinkIndex::new();
        index.apply_change(DocumentChange::new("notes/a.md", ["b.md"]).with_title("Alpha"));
        index.upsert_document("notes/a.md", ["c.md"]);

        assert_eq!(index.document("notes/a.md").map(|d| d.title.as_str()), Some("Alpha"));
        assert_eq!(index.revision(), 2);
    }
}
