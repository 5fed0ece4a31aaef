//! Filesystem snapshot of the pages directory.
//!
//! The route builder never touches the filesystem directly. It consumes a
//! [`FileTreeDir`] produced by one walk of the pages directory, so a build
//! always works against a single consistent snapshot.
//!
//! ## Paths
//!
//! Every node carries `src`, its path relative to the project root with `/`
//! separators (`src/pages/blog/[slug].tsx`). These strings become the file
//! references stored in `routes.json`, which is why they are project-relative
//! rather than absolute: the route tree must survive moving the checkout.
//!
//! Hidden entries (leading `.`) are skipped. Children are sorted by file name
//! so the resulting tree, and everything derived from it, is deterministic.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum FileTreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// One entry of a directory walk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FileTree {
    Dir(FileTreeDir),
    File(FileTreeFile),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileTreeDir {
    pub name: String,
    pub src: String,
    pub children: Vec<FileTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileTreeFile {
    pub name: String,
    pub src: String,
}

impl FileTree {
    pub fn name(&self) -> &str {
        match self {
            FileTree::Dir(dir) => &dir.name,
            FileTree::File(file) => &file.name,
        }
    }

    pub fn src(&self) -> &str {
        match self {
            FileTree::Dir(dir) => &dir.src,
            FileTree::File(file) => &file.src,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileTree::Dir(_))
    }
}

/// Walk `dir` and return its tree, with `src` paths relative to `base`.
///
/// `base` is normally the project root, so that `src/pages` walked from the
/// root yields file refs like `src/pages/index.tsx`.
pub fn read_file_tree(dir: &Path, base: &Path) -> Result<FileTreeDir, FileTreeError> {
    if !dir.is_dir() {
        return Err(FileTreeError::NotADirectory(dir.to_path_buf()));
    }
    walk_dir(dir, base)
}

fn walk_dir(path: &Path, base: &Path) -> Result<FileTreeDir, FileTreeError> {
    let mut children = Vec::new();

    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }

        if entry.file_type().is_dir() {
            children.push(FileTree::Dir(walk_dir(entry.path(), base)?));
        } else {
            children.push(FileTree::File(FileTreeFile {
                name,
                src: relative_src(entry.path(), base),
            }));
        }
    }

    Ok(FileTreeDir {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        src: relative_src(path, base),
        children,
    })
}

/// `path` relative to `base`, joined with `/` regardless of platform.
pub(crate) fn relative_src(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_files;
    use tempfile::TempDir;

    #[test]
    fn walk_produces_sorted_children() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &["src/pages/b.tsx", "src/pages/a.tsx", "src/pages/blog/index.tsx"],
        );

        let tree = read_file_tree(&tmp.path().join("src/pages"), tmp.path()).unwrap();
        let names: Vec<&str> = tree.children.iter().map(|c| c.name()).collect();

        assert_eq!(names, vec!["a.tsx", "b.tsx", "blog"]);
        assert_eq!(tree.name, "pages");
        assert_eq!(tree.src, "src/pages");
    }

    #[test]
    fn src_paths_are_project_relative() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &["src/pages/blog/[slug].tsx"]);

        let tree = read_file_tree(&tmp.path().join("src/pages"), tmp.path()).unwrap();
        let FileTree::Dir(blog) = &tree.children[0] else {
            panic!("expected blog directory");
        };

        assert_eq!(blog.src, "src/pages/blog");
        assert_eq!(blog.children[0].src(), "src/pages/blog/[slug].tsx");
        assert!(!blog.children[0].is_dir());
    }

    #[test]
    fn hidden_entries_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &["pages/.DS_Store", "pages/.cache/x.tsx", "pages/index.tsx"],
        );

        let tree = read_file_tree(&tmp.path().join("pages"), tmp.path()).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].name(), "index.tsx");
    }

    #[test]
    fn missing_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = read_file_tree(&tmp.path().join("nope"), tmp.path());
        assert!(matches!(result, Err(FileTreeError::NotADirectory(_))));
    }

    #[test]
    fn empty_directory_has_no_children() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("pages")).unwrap();

        let tree = read_file_tree(&tmp.path().join("pages"), tmp.path()).unwrap();
        assert!(tree.children.is_empty());
    }
}
