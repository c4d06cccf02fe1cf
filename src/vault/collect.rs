use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};

use local_graph::{DocumentChange, DocumentSource, Update};

use super::parse::{RawLink, first_heading, normalize_relative, parse_manifest, scan_links};

/// One load of a vault: every document with its resolved outgoing links.
#[derive(Clone, Debug, Default)]
pub struct Vault {
    root: PathBuf,
    documents: BTreeMap<String, DocumentChange>,
    active: Option<String>,
}

impl Vault {
    pub fn from_documents(
        root: impl Into<PathBuf>,
        documents: impl IntoIterator<Item = DocumentChange>,
        active: Option<String>,
    ) -> Self {
        Self {
            root: root.into(),
            documents: documents
                .into_iter()
                .map(|document| (document.id.clone(), document))
                .collect(),
            active,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn set_active(&mut self, active: Option<String>) {
        if active.is_some() {
            self.active = active;
        }
    }

    /// Updates that turn `previous` into this vault.
    pub fn diff(&self, previous: &Vault) -> Vec<Update> {
        let mut updates = self
            .documents
            .iter()
            .filter(|(id, document)| previous.documents.get(*id) != Some(*document))
            .map(|(_, document)| Update::DocumentChanged(document.clone()))
            .collect::<Vec<_>>();
        updates.extend(
            previous
                .documents
                .keys()
                .filter(|id| !self.documents.contains_key(*id))
                .map(|id| Update::DocumentDeleted { id: id.clone() }),
        );
        updates
    }
}

impl DocumentSource for Vault {
    fn documents(&self) -> Vec<DocumentChange> {
        self.documents.values().cloned().collect()
    }

    fn active_document(&self) -> Option<String> {
        self.active
            .clone()
            .or_else(|| self.documents.keys().next().cloned())
    }
}

/// Loads a directory of Markdown notes or a JSON manifest file.
pub fn load_vault(path: &Path) -> Result<Vault> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to open vault {}", path.display()))?;

    let vault = if metadata.is_dir() {
        load_directory(path)?
    } else {
        load_manifest(path)?
    };
    info!("loaded {} documents from {}", vault.len(), path.display());
    Ok(vault)
}

fn load_manifest(path: &Path) -> Result<Vault> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest =
        parse_manifest(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Vault::from_documents(path, manifest.documents, manifest.active))
}

fn load_directory(root: &Path) -> Result<Vault> {
    let mut files = Vec::new();
    collect_markdown_files(root, &mut files)?;
    files.sort();

    let mut parsed = Vec::with_capacity(files.len());
    for file in &files {
        let id = vault_id(root, file)?;
        let text = fs::read_to_string(file)
            .with_context(|| format!("failed to read note {}", file.display()))?;
        parsed.push((id, first_heading(&text), scan_links(&text)));
    }

    if parsed.is_empty() {
        return Err(anyhow!("no Markdown notes found under {}", root.display()));
    }

    let mut by_name: HashMap<String, &str> = HashMap::with_capacity(parsed.len());
    for (id, _, _) in &parsed {
        by_name
            .entry(note_name(id).to_lowercase())
            .or_insert(id.as_str());
    }

    let documents = parsed
        .iter()
        .map(|(id, title, raw_links)| {
            let base_dir = id.rsplit_once('/').map_or("", |(dir, _)| dir);
            let links = raw_links
                .iter()
                .filter_map(|link| resolve_link(link, base_dir, &by_name))
                .filter(|target| target != id)
                .collect::<Vec<_>>();
            let document = DocumentChange::new(id.clone(), links);
            match title {
                Some(title) => document.with_title(title.clone()),
                None => document,
            }
        })
        .collect::<Vec<_>>();

    debug!("resolved links for {} notes", documents.len());
    Ok(Vault::from_documents(root, documents, None))
}

fn collect_markdown_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden {
            continue;
        }

        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if file_type.is_dir() {
            collect_markdown_files(&path, files)?;
        } else if path.extension().is_some_and(|extension| extension == "md") {
            files.push(path);
        }
    }
    Ok(())
}

fn vault_id(root: &Path, file: &Path) -> Result<String> {
    let relative = file
        .strip_prefix(root)
        .with_context(|| format!("{} is outside the vault", file.display()))?;
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>();
    Ok(parts.join("/"))
}

fn note_name(id: &str) -> &str {
    let name = id.rsplit('/').next().unwrap_or(id);
    name.strip_suffix(".md").unwrap_or(name)
}

fn resolve_link(link: &RawLink, base_dir: &str, by_name: &HashMap<String, &str>) -> Option<String> {
    match link {
        RawLink::Relative(path) => normalize_relative(base_dir, path),
        RawLink::Wiki(target) => {
            let target = target.strip_suffix(".md").unwrap_or(target);
            if Path::new(target)
                .extension()
                .is_some_and(|extension| extension != "md")
            {
                return None;
            }
            if target.contains('/') {
                let resolved = normalize_relative("", &format!("{target}.md"));
                if resolved.is_none() {
                    warn!("ignoring link [[{target}]] that leaves the vault");
                }
                return resolved;
            }
            Some(
                by_name
                    .get(&target.to_lowercase())
                    .map_or_else(|| format!("{target}.md"), |id| (*id).to_owned()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_vault(name: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = std::env::temp_dir().join(format!("local-graph-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        for (path, body) in files {
            let path = root.join(path);
            fs::create_dir_all(path.parent().expect("file has a parent")).expect("create dirs");
            fs::write(path, body).expect("write note");
        }
        root
    }

    #[test]
    fn directory_links_resolve_by_name_and_path() {
        let root = temp_vault(
            "resolve",
            &[
                ("index.md", "# Home\n[[Project]] [[ideas/later|someday]] [[Unwritten]]"),
                ("work/project.md", "[back](../index.md) ![[chart.png]]"),
                ("ideas/later.md", "[[index]]"),
                (".obsidian/workspace.md", "[[index]]"),
            ],
        );
        let vault = load_vault(&root).expect("vault loads");
        let _ = fs::remove_dir_all(&root);

        assert_eq!(
            vault.ids().collect::<Vec<_>>(),
            vec!["ideas/later.md", "index.md", "work/project.md"]
        );
        let documents = vault.documents();
        let index = documents
            .iter()
            .find(|document| document.id == "index.md")
            .expect("index loaded");
        assert_eq!(index.title.as_deref(), Some("Home"));
        assert_eq!(
            index.links,
            vec!["work/project.md", "ideas/later.md", "Unwritten.md"]
        );

        let project = documents
            .iter()
            .find(|document| document.id == "work/project.md")
            .expect("project loaded");
        assert_eq!(project.links, vec!["index.md"]);
        assert_eq!(vault.active_document().as_deref(), Some("ideas/later.md"));
    }

    #[test]
    fn missing_vault_reports_the_path() {
        let error = load_vault(Path::new("/definitely/not/here")).expect_err("must fail");
        assert!(error.to_string().contains("/definitely/not/here"));
    }

    #[test]
    fn diff_reports_changes_and_deletions() {
        let before = Vault::from_documents(
            "v",
            [
                DocumentChange::new("a", ["b"]),
                DocumentChange::new("b", Vec::<String>::new()),
                DocumentChange::new("c", ["a"]),
            ],
            None,
        );
        let after = Vault::from_documents(
            "v",
            [
                DocumentChange::new("a", ["c"]),
                DocumentChange::new("c", ["a"]),
                DocumentChange::new("d", Vec::<String>::new()),
            ],
            None,
        );

        assert_eq!(
            after.diff(&before),
            vec![
                Update::DocumentChanged(DocumentChange::new("a", ["c"])),
                Update::DocumentChanged(DocumentChange::new("d", Vec::<String>::new())),
                Update::DocumentDeleted { id: "b".into() },
            ]
        );
    }
}
