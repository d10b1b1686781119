//! Hierarchical view of an embedded archive
//!
//! The flat listing from [`crate::list_archive_flat`] is folded into a tree
//! of [`FolderNode`]s and [`FileNode`]s rooted at a synthetic root folder.
//! Children are kept in `BTreeMap`s, so every enumeration is in lexical
//! order of child names.

use crate::archive::{list_archive_flat, EntryInfo};
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Display name of the root folder
pub const ROOT_NAME: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNode {
    pub name: String,
    pub full_path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    pub name: String,
    /// Archive name of this folder; empty for the root
    pub full_path: String,
    pub files: BTreeMap<String, FileNode>,
    pub folders: BTreeMap<String, FolderNode>,
}

/// One node of a tree, as yielded by [`FolderNode::nodes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeRef<'a> {
    pub full_path: &'a str,
    pub is_dir: bool,
    pub size: u64,
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl FolderNode {
    /// Empty root folder
    pub fn root() -> Self {
        Self::new(ROOT_NAME, String::new())
    }

    fn new(name: &str, full_path: String) -> Self {
        Self {
            name: name.to_string(),
            full_path,
            files: BTreeMap::new(),
            folders: BTreeMap::new(),
        }
    }

    /// Insert `entry` under its parent folder, creating any missing ancestors.
    ///
    /// Returns `false` when a node of the same kind and name already sits at
    /// that position; the existing node is kept.
    pub fn insert(&mut self, entry: &EntryInfo) -> bool {
        let parts: Vec<&str> = segments(&entry.path).collect();
        let Some((leaf, parents)) = parts.split_last() else {
            return false;
        };

        let mut current = self;
        for part in parents {
            let full_path = join(&current.full_path, part);
            current = current
                .folders
                .entry(part.to_string())
                .or_insert_with(|| FolderNode::new(part, full_path));
        }

        let inserted = if entry.is_dir {
            if current.folders.contains_key(*leaf) {
                false
            } else {
                current
                    .folders
                    .insert(leaf.to_string(), FolderNode::new(leaf, entry.path.clone()));
                true
            }
        } else if current.files.contains_key(*leaf) {
            false
        } else {
            current.files.insert(
                leaf.to_string(),
                FileNode {
                    name: leaf.to_string(),
                    full_path: entry.path.clone(),
                    size: entry.size,
                },
            );
            true
        };

        if !inserted {
            debug!(path = %entry.path, "node already present, keeping the first one");
        }
        inserted
    }

    /// Folder at `path` relative to this one; the empty path is `self`
    pub fn folder(&self, path: &str) -> Option<&FolderNode> {
        segments(path).try_fold(self, |folder, part| folder.folders.get(part))
    }

    /// File at `path` relative to this folder
    pub fn file(&self, path: &str) -> Option<&FileNode> {
        let path = path.trim_end_matches('/');
        let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
        self.folder(parent)?.files.get(name)
    }

    /// Every descendant node; siblings are listed together, folders before files
    pub fn nodes(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(folder) = stack.pop() {
            for child in folder.folders.values() {
                out.push(NodeRef {
                    full_path: &child.full_path,
                    is_dir: true,
                    size: 0,
                });
            }
            for file in folder.files.values() {
                out.push(NodeRef {
                    full_path: &file.full_path,
                    is_dir: false,
                    size: file.size,
                });
            }
            stack.extend(folder.folders.values().rev());
        }
        out
    }

    /// True when the folder has no children
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for folder in self.folders.values() {
            writeln!(f, "{:indent$}{}/", "", folder.name, indent = depth * 2)?;
            folder.render(f, depth + 1)?;
        }
        for file in self.files.values() {
            writeln!(f, "{:indent$}{} ({} bytes)", "", file.name, file.size, indent = depth * 2)?;
        }
        Ok(())
    }
}

impl Default for FolderNode {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for FolderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        self.render(f, 1)
    }
}

/// Fold a flat listing into a tree. Pure; performs no I/O.
pub fn build_tree(flat: &BTreeMap<String, EntryInfo>) -> FolderNode {
    let mut root = FolderNode::root();
    for entry in flat.values() {
        root.insert(entry);
    }
    root
}

/// Index a stapled file and build its tree.
///
/// An empty `stapled` path reads the running executable.
pub fn build_archive_tree(stapled: &Path) -> Result<FolderNode> {
    let flat = list_archive_flat(stapled)?;
    Ok(build_tree(&flat))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(path: &str) -> EntryInfo {
        EntryInfo {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap().to_string(),
            size: 0,
            is_dir: true,
            mode: 0o755,
            modified_time: 0,
        }
    }

    fn file(path: &str, size: u64) -> EntryInfo {
        EntryInfo {
            size,
            is_dir: false,
            mode: 0o644,
            ..dir(path)
        }
    }

    fn flat(entries: Vec<EntryInfo>) -> BTreeMap<String, EntryInfo> {
        entries.into_iter().map(|e| (e.path.clone(), e)).collect()
    }

    #[test]
    fn test_empty_listing_yields_root() {
        let root = build_tree(&BTreeMap::new());
        assert_eq!(root.name, ROOT_NAME);
        assert_eq!(root.full_path, "");
        assert!(root.is_empty());
    }

    #[test]
    fn test_missing_ancestors_are_created() {
        let root = build_tree(&flat(vec![file("a/b/c.txt", 3)]));

        let a = root.folder("a").unwrap();
        assert_eq!(a.full_path, "a");
        let b = root.folder("a/b").unwrap();
        assert_eq!(b.full_path, "a/b");
        assert_eq!(b.name, "b");

        let c = root.file("a/b/c.txt").unwrap();
        assert_eq!(c.full_path, "a/b/c.txt");
        assert_eq!(c.size, 3);
    }

    #[test]
    fn test_duplicate_directory_insert_is_noop() {
        let mut root = FolderNode::root();
        assert!(root.insert(&file("docs/readme.md", 7)));
        // "docs" already exists as an implied folder
        assert!(!root.insert(&dir("docs")));
        assert!(!root.insert(&dir("docs")));

        assert_eq!(root.folders.len(), 1);
        let docs = root.folder("docs").unwrap();
        assert_eq!(docs.files.len(), 1);
    }

    #[test]
    fn test_first_file_wins() {
        let mut root = FolderNode::root();
        assert!(root.insert(&file("x.bin", 1)));
        assert!(!root.insert(&file("x.bin", 99)));
        assert_eq!(root.file("x.bin").unwrap().size, 1);
    }

    #[test]
    fn test_nodes_match_listing() {
        let listing = flat(vec![
            dir("testfolder"),
            file("testfolder/file1.txt", 22),
            file("testfolder/file2.txt", 23),
            dir("testfolder/subfolder"),
            file("testfolder/subfolder/file3.txt", 29),
        ]);
        let root = build_tree(&listing);

        let mut from_tree: Vec<(String, bool, u64)> = root
            .nodes()
            .into_iter()
            .map(|n| (n.full_path.to_string(), n.is_dir, n.size))
            .collect();
        from_tree.sort();
        let from_flat: Vec<(String, bool, u64)> = listing
            .values()
            .map(|e| (e.path.clone(), e.is_dir, e.size))
            .collect();
        assert_eq!(from_tree, from_flat);

        assert_eq!(build_tree(&listing), root);
    }

    #[test]
    fn test_render_is_sorted() {
        let root = build_tree(&flat(vec![file("b.txt", 2), file("a/z.txt", 1)]));
        assert_eq!(root.to_string(), "/\n  a/\n    z.txt (1 bytes)\n  b.txt (2 bytes)\n");
    }
}
