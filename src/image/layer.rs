use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::{clean_path, FileRef};

/// OCI whiteout marker prefix: `.wh.<name>` deletes `<name>` from lower layers.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// Marker that hides every lower-layer entry of its directory.
pub const OPAQUE_WHITEOUT: &str = ".wh..wh..opq";

/// Where the bytes of a regular file live.
#[derive(Debug, Clone)]
pub enum Content {
    Inline(Arc<[u8]>),
    Disk(PathBuf),
}

impl Content {
    pub fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        match self {
            Content::Inline(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
            Content::Disk(path) => Ok(Box::new(File::open(path)?)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EntryKind {
    File(Content),
    Dir,
    /// Link target as recorded in the layer (absolute or relative to the link's directory).
    Symlink(String),
}

/// One path inside one layer.
#[derive(Debug, Clone)]
pub struct Entry {
    pub reference: FileRef,
    pub kind: EntryKind,
}

impl Entry {
    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File(_))
    }
}

/// A path -> entry map, always keyed by cleaned absolute paths.
pub type Tree = BTreeMap<String, Entry>;

/// A single filesystem layer, with the deletions it applies to the layers below it.
#[derive(Debug, Clone)]
pub struct Layer {
    pub index: usize,
    pub id: String,
    pub tree: Tree,
    pub whiteouts: Vec<String>,
    pub opaque_dirs: Vec<String>,
}

impl Layer {
    pub(crate) fn empty(index: usize, id: impl Into<String>) -> Self {
        Self {
            index,
            id: id.into(),
            tree: Tree::new(),
            whiteouts: Vec::new(),
            opaque_dirs: Vec::new(),
        }
    }

    /// Records a path, routing whiteout markers to the deletion lists.
    pub(crate) fn insert(&mut self, path: &str, kind: EntryKind, next_id: &mut u64) {
        let path = clean_path(path);
        let (parent, name) = split_parent(&path);

        if name == OPAQUE_WHITEOUT {
            self.opaque_dirs.push(parent.to_string());
            return;
        }
        if let Some(hidden) = name.strip_prefix(WHITEOUT_PREFIX) {
            self.whiteouts.push(clean_path(&format!("{}/{}", parent, hidden)));
            return;
        }

        let reference = FileRef::new(*next_id, path.clone());
        *next_id += 1;
        self.tree.insert(path, Entry { reference, kind });
    }

    /// Loads an unpacked layer directory from disk.
    pub fn from_dir(index: usize, dir: &Path, next_id: &mut u64) -> Result<Self> {
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("layer-{}", index));
        let mut layer = Layer::empty(index, id);

        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Source {
                specifier: dir.display().to_string(),
                reason: e.to_string(),
            })?;

            let relative = match entry.path().strip_prefix(dir) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel,
                _ => continue,
            };
            let virtual_path = format!("/{}", relative.to_string_lossy().replace('\\', "/"));

            let file_type = entry.file_type();
            let kind = if file_type.is_symlink() {
                let target = fs::read_link(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
                EntryKind::Symlink(target.to_string_lossy().to_string())
            } else if file_type.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File(Content::Disk(entry.path().to_path_buf()))
            };

            layer.insert(&virtual_path, kind, next_id);
        }

        Ok(layer)
    }
}

/// Splits a cleaned absolute path into (parent, file name).
pub(crate) fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("/", path),
    }
}

/// Applies one layer on top of the squash of the layers below it.
pub(crate) fn squash_onto(lower: &Tree, layer: &Layer) -> Tree {
    let mut tree = lower.clone();

    for dir in &layer.opaque_dirs {
        let prefix = if dir == "/" { "/".to_string() } else { format!("{}/", dir) };
        tree.retain(|path, _| !path.starts_with(&prefix));
    }

    for hidden in &layer.whiteouts {
        let prefix = format!("{}/", hidden);
        tree.retain(|path, _| path != hidden && !path.starts_with(&prefix));
    }

    for (path, entry) in &layer.tree {
        tree.insert(path.clone(), entry.clone());
    }

    tree
}
