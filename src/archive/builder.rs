use crate::archive::path::{archive_name, child_name};
use crate::error::{IoResultExt, Result, StapleError};
use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tar::{Builder, Header, HeaderMode};
use tracing::debug;

/// A host path waiting to be written, with the archive name it will get
struct Pending {
    source: PathBuf,
    name: String,
    /// Canonical paths of the directories this entry was expanded from
    ancestors: Rc<Vec<PathBuf>>,
    /// Given by the caller rather than found by expansion
    top_level: bool,
}

/// Serialize `paths` into a tar stream written to `sink`.
///
/// Directories are expanded depth-first with an explicit work list; a
/// directory header always precedes its children, and children are visited
/// in lexical order of their file names. Symlinks are dereferenced.
/// A nested top-level path such as `a/b/c.txt` is preceded by headers for
/// `a` and `a/b`, each written once per archive.
///
/// Returns the number of content bytes written (file bodies only, headers
/// and padding excluded). On failure, bytes already handed to `sink` stay
/// there.
pub fn build_archive<W: Write>(paths: &[PathBuf], sink: W) -> Result<u64> {
    build(None, paths, sink)
}

/// Like [`build_archive`], but relative `paths` are read from under `base`.
///
/// Archive names are still derived from `paths` as given, so
/// `build_archive_in("/srv", ["site/index.html"])` stores `site/index.html`.
pub fn build_archive_in<W: Write>(base: &Path, paths: &[PathBuf], sink: W) -> Result<u64> {
    build(Some(base), paths, sink)
}

fn build<W: Write>(base: Option<&Path>, paths: &[PathBuf], sink: W) -> Result<u64> {
    let mut builder = Builder::new(sink);

    let mut pending = Vec::with_capacity(paths.len());
    for path in paths.iter().rev() {
        pending.push(Pending {
            source: base.map_or_else(|| path.clone(), |base| base.join(path)),
            name: archive_name(path)?,
            ancestors: Rc::new(Vec::new()),
            top_level: true,
        });
    }

    let mut dirs_written = HashSet::new();
    let mut contents_size = 0u64;
    while let Some(item) = pending.pop() {
        if item.top_level {
            append_parents(&mut builder, &mut dirs_written, &item)?;
        }

        let metadata = fs::metadata(&item.source)
            .access(|| format!("accessing {} to include in stapled file", item.source.display()))?;

        if metadata.is_file() {
            contents_size += append_file(&mut builder, &item, &metadata)?;
        } else if metadata.is_dir() {
            let children = expand_dir(&mut builder, &item, &metadata)?;
            dirs_written.insert(item.name.clone());
            pending.extend(children.into_iter().rev());
        } else {
            return Err(StapleError::InvalidInput(format!(
                "{} is neither a regular file nor a directory",
                item.source.display()
            )));
        }
    }

    builder
        .into_inner()
        .access(|| "writing the archive terminator")?;

    Ok(contents_size)
}

fn append_file<W: Write>(builder: &mut Builder<W>, item: &Pending, metadata: &Metadata) -> Result<u64> {
    // Header size comes from what was actually read, not from the stat
    let contents = fs::read(&item.source)
        .access(|| format!("reading {} to add into the archive", item.source.display()))?;
    let size = contents.len() as u64;

    let mut header = entry_header(metadata, size);
    builder
        .append_data(&mut header, &item.name, contents.as_slice())
        .access(|| format!("writing {} into the archive", item.name))?;

    debug!(name = %item.name, size, "archived file");
    Ok(size)
}

/// Write headers for the folders implied by a nested top-level name,
/// outermost first, skipping any already in the archive
fn append_parents<W: Write>(
    builder: &mut Builder<W>,
    written: &mut HashSet<String>,
    item: &Pending,
) -> Result<()> {
    let mut parents = Vec::new();
    let mut name = item.name.as_str();
    let mut source = item.source.parent();
    while let (Some((parent_name, _)), Some(parent_source)) = (name.rsplit_once('/'), source) {
        parents.push((parent_name, parent_source));
        name = parent_name;
        source = parent_source.parent();
    }

    for (name, source) in parents.into_iter().rev() {
        if written.contains(name) {
            continue;
        }
        let metadata = fs::metadata(source)
            .access(|| format!("accessing {} to include in stapled file", source.display()))?;
        let mut header = entry_header(&metadata, 0);
        builder
            .append_data(&mut header, name, io::empty())
            .access(|| format!("writing header information for {}", name))?;
        debug!(name, "archived parent directory");
        written.insert(name.to_string());
    }

    Ok(())
}

/// Write the directory header and return its children, sorted by name
fn expand_dir<W: Write>(
    builder: &mut Builder<W>,
    item: &Pending,
    metadata: &Metadata,
) -> Result<Vec<Pending>> {
    let canonical = fs::canonicalize(&item.source)
        .access(|| format!("resolving {}", item.source.display()))?;
    if item.ancestors.contains(&canonical) {
        return Err(StapleError::InvalidInput(format!(
            "{} links back to one of its parent directories",
            item.source.display()
        )));
    }

    let mut header = entry_header(metadata, 0);
    builder
        .append_data(&mut header, &item.name, io::empty())
        .access(|| format!("writing header information for {}", item.name))?;
    debug!(name = %item.name, "archived directory");

    let mut names = Vec::new();
    let entries = fs::read_dir(&item.source)
        .access(|| format!("reading the contents of {}", item.source.display()))?;
    for entry in entries {
        let entry = entry.access(|| format!("reading the contents of {}", item.source.display()))?;
        let file_name = entry.file_name();
        let file_name = file_name.to_str().ok_or_else(|| {
            StapleError::InvalidInput(format!(
                "File name is not valid UTF-8: {}",
                entry.path().display()
            ))
        })?;
        names.push(file_name.to_string());
    }
    names.sort();

    let mut ancestors = Vec::with_capacity(item.ancestors.len() + 1);
    ancestors.extend(item.ancestors.iter().cloned());
    ancestors.push(canonical);
    let ancestors = Rc::new(ancestors);

    Ok(names
        .into_iter()
        .map(|name| Pending {
            source: item.source.join(&name),
            name: child_name(&item.name, &name),
            ancestors: Rc::clone(&ancestors),
            top_level: false,
        })
        .collect())
}

fn entry_header(metadata: &Metadata, size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(metadata, HeaderMode::Complete);
    header.set_size(size);
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn names_in(tar_bytes: &[u8]) -> Vec<(String, bool, u64)> {
        let mut archive = tar::Archive::new(Cursor::new(tar_bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let entry = entry.unwrap();
                let name = String::from_utf8(entry.path_bytes().into_owned()).unwrap();
                (name, entry.header().entry_type().is_dir(), entry.size())
            })
            .collect()
    }

    #[test]
    fn test_directory_expansion_order() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("b_sub")).unwrap();
        fs::write(root.join("c.txt"), b"ccc").unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("b_sub").join("inner.txt"), b"inner").unwrap();

        let mut out = Vec::new();
        let written = build_archive_in(dir.path(), &[PathBuf::from("root")], &mut out).unwrap();
        assert_eq!(written, 3 + 1 + 5);

        let expected = vec![
            ("root".to_string(), true, 0),
            ("root/a.txt".to_string(), false, 1),
            ("root/b_sub".to_string(), true, 0),
            ("root/b_sub/inner.txt".to_string(), false, 5),
            ("root/c.txt".to_string(), false, 3),
        ];
        assert_eq!(names_in(&out), expected);
    }

    #[test]
    fn test_nested_paths_get_parent_headers() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/c.txt"), b"c").unwrap();
        fs::write(dir.path().join("a/b/d.txt"), b"dd").unwrap();
        fs::write(dir.path().join("a/e.txt"), b"eee").unwrap();

        let paths = ["a/b/c.txt", "a/b/d.txt", "a/e.txt"].map(PathBuf::from);
        let mut out = Vec::new();
        build_archive_in(dir.path(), &paths, &mut out).unwrap();

        let expected = vec![
            ("a".to_string(), true, 0),
            ("a/b".to_string(), true, 0),
            ("a/b/c.txt".to_string(), false, 1),
            ("a/b/d.txt".to_string(), false, 2),
            ("a/e.txt".to_string(), false, 3),
        ];
        assert_eq!(names_in(&out), expected);
    }

    #[test]
    fn test_expanded_directory_is_not_repeated_as_parent() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/c.txt"), b"c").unwrap();

        let paths = ["a", "a/b/c.txt"].map(PathBuf::from);
        let mut out = Vec::new();
        build_archive_in(dir.path(), &paths, &mut out).unwrap();

        let dirs: Vec<String> = names_in(&out)
            .into_iter()
            .filter(|(_, is_dir, _)| *is_dir)
            .map(|(name, _, _)| name)
            .collect();
        assert_eq!(dirs, vec!["a", "a/b"]);
    }

    #[test]
    fn test_absolute_path_parents_are_relative() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("asset.txt");
        fs::write(&file, b"x").unwrap();

        let mut out = Vec::new();
        build_archive(&[file.clone()], &mut out).unwrap();
        let listed = names_in(&out);

        let (last, parents) = listed.split_last().unwrap();
        assert_eq!(last.0, archive_name(&file).unwrap());
        assert!(!last.1);
        for (i, (name, is_dir, _)) in parents.iter().enumerate() {
            assert!(*is_dir);
            assert!(!name.starts_with('/'));
            assert_eq!(name.split('/').count(), i + 1);
        }
    }

    #[test]
    fn test_names_relative_to_base() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("site/css")).unwrap();
        fs::write(dir.path().join("site/css/main.css"), b"body{}").unwrap();

        let mut out = Vec::new();
        build_archive_in(dir.path(), &[PathBuf::from("./site")], &mut out).unwrap();
        let names: Vec<String> = names_in(&out).into_iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, vec!["site", "site/css", "site/css/main.css"]);
    }

    #[test]
    fn test_missing_path_is_access_error() {
        let dir = tempdir().unwrap();
        let mut out = Vec::new();
        let err = build_archive(&[dir.path().join("nope.txt")], &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
    }

    #[test]
    fn test_top_level_order_is_preserved() {
        let dir = tempdir().unwrap();
        let second = dir.path().join("z.txt");
        let first = dir.path().join("a.txt");
        fs::write(&second, b"zz").unwrap();
        fs::write(&first, b"a").unwrap();

        let mut out = Vec::new();
        let paths = ["z.txt", "a.txt"].map(PathBuf::from);
        build_archive_in(dir.path(), &paths, &mut out).unwrap();
        let names: Vec<String> = names_in(&out).into_iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, vec!["z.txt", "a.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_rejected() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("loop");
        fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(&root, root.join("again")).unwrap();

        let mut out = Vec::new();
        let err = build_archive(&[root], &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
