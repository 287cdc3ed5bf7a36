//! Layered container image model.
//!
//! An [`Image`] is an ordered list of [`Layer`]s (oldest first), the squashed
//! view at every layer, and a reference index used to fetch content. It is
//! the primitive the resolvers in [`crate::source`] wrap.
//!
//! # On-disk layout
//!
//! [`Image::open`] reads an unpacked image directory:
//!
//! ```text
//! image/
//! ├── manifest.json      {"layers": ["base", "app"]}
//! ├── base/              layer 0, an unpacked filesystem
//! └── app/               layer 1, may contain .wh.* whiteout markers
//! ```
//!
//! # Example
//!
//! ```
//! use layerscan::image::Image;
//!
//! let image = Image::builder()
//!     .layer(|l| l.file("/etc/os-release", "ID=alpine"))
//!     .layer(|l| l.file("/etc/os-release", "ID=debian"))
//!     .build();
//!
//! assert_eq!(image.layers().len(), 2);
//! ```

mod content;
mod layer;

pub use content::{ContentIterator, ContentObservation, ContentObserver};
pub use layer::{Content, Entry, EntryKind, Layer, Tree, OPAQUE_WHITEOUT, WHITEOUT_PREFIX};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Upper bound on symlink hops while resolving a path.
const MAX_LINK_DEPTH: usize = 40;

static EMPTY_TREE: Tree = Tree::new();

/// Manifest file naming the layer directories of an unpacked image.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Opaque, comparable handle to one file entry in one layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileRef {
    id: u64,
    real_path: String,
}

impl FileRef {
    pub(crate) fn new(id: u64, real_path: String) -> Self {
        Self { id, real_path }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn real_path(&self) -> &str {
        &self.real_path
    }
}

#[derive(Debug, Deserialize)]
struct ImageManifest {
    layers: Vec<String>,
}

#[derive(Debug)]
pub struct Image {
    layers: Vec<Layer>,
    squashes: Vec<Tree>,
    index: HashMap<u64, (usize, String)>,
}

impl Image {
    /// Opens an unpacked image directory (see the module docs for the layout).
    pub fn open(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&manifest_path).map_err(|e| Error::io(&manifest_path, e))?;
        let manifest: ImageManifest = serde_json::from_str(&raw).map_err(|e| Error::Source {
            specifier: dir.display().to_string(),
            reason: format!("invalid {}: {}", MANIFEST_FILE, e),
        })?;

        if manifest.layers.is_empty() {
            return Err(Error::Source {
                specifier: dir.display().to_string(),
                reason: "image has no layers".to_string(),
            });
        }

        let mut next_id = 0;
        let mut layers = Vec::with_capacity(manifest.layers.len());
        for (index, name) in manifest.layers.iter().enumerate() {
            let layer_dir = dir.join(name);
            if !layer_dir.is_dir() {
                return Err(Error::Source {
                    specifier: dir.display().to_string(),
                    reason: format!("layer directory {:?} is missing", name),
                });
            }
            layers.push(Layer::from_dir(index, &layer_dir, &mut next_id)?);
        }

        debug!(path = %dir.display(), layers = layers.len(), "opened image");
        Ok(Self::from_layers(layers))
    }

    pub fn builder() -> ImageBuilder {
        ImageBuilder::default()
    }

    fn from_layers(layers: Vec<Layer>) -> Self {
        let mut squashes: Vec<Tree> = Vec::with_capacity(layers.len());
        let mut index = HashMap::new();

        for layer in &layers {
            let squash = match squashes.last() {
                Some(lower) => layer::squash_onto(lower, layer),
                None => layer::squash_onto(&Tree::new(), layer),
            };
            squashes.push(squash);

            for (path, entry) in &layer.tree {
                index.insert(entry.reference.id, (layer.index, path.clone()));
            }
        }

        Self {
            layers,
            squashes,
            index,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The merged view of layers `0..=layer`.
    pub fn squash_at(&self, layer: usize) -> Option<&Tree> {
        self.squashes.get(layer)
    }

    /// The merged view of every layer.
    pub fn squashed(&self) -> &Tree {
        self.squashes.last().unwrap_or(&EMPTY_TREE)
    }

    /// The layer that introduced the given reference.
    pub fn layer_of(&self, reference: &FileRef) -> Option<usize> {
        self.index.get(&reference.id).map(|(layer, _)| *layer)
    }

    fn entry(&self, reference: &FileRef) -> Option<&Entry> {
        let (layer, path) = self.index.get(&reference.id)?;
        self.layers.get(*layer)?.tree.get(path)
    }

    /// Opens the content of a regular file entry.
    pub fn file_contents(&self, reference: &FileRef) -> Result<Box<dyn Read + Send>> {
        let entry = self
            .entry(reference)
            .filter(|e| e.reference == *reference)
            .ok_or_else(|| Error::NotFound(reference.real_path.clone()))?;

        match &entry.kind {
            EntryKind::File(content) => content.open().map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::NotFound(reference.real_path.clone()),
                _ => Error::io(&reference.real_path, e),
            }),
            _ => Err(Error::NotFound(reference.real_path.clone())),
        }
    }
}

impl ContentIterator for Image {
    fn iterate_content(&self, observers: &[&dyn ContentObserver]) -> Result<()> {
        let files = self
            .layers
            .iter()
            .flat_map(|layer| layer.tree.values())
            .filter(|entry| entry.is_file())
            .map(|entry| &entry.reference);

        content::fan_out(files, observers, |reference| self.file_contents(reference))
    }
}

/// Resolves `path` within `tree` one component at a time, following a symlink
/// wherever one appears (ancestor directories included).
///
/// Missing components are kept as written, so the result names where the path
/// would live. `None` only when the link chain is too deep.
pub fn resolve_real_path(tree: &Tree, path: &str) -> Option<String> {
    let mut pending: Vec<String> = clean_path(path).split('/').rev().map(String::from).collect();
    let mut resolved: Vec<String> = Vec::new();
    let mut hops = 0;

    while let Some(part) = pending.pop() {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            resolved.pop();
            continue;
        }
        resolved.push(part);

        let current = format!("/{}", resolved.join("/"));
        if let Some(Entry {
            kind: EntryKind::Symlink(target),
            ..
        }) = tree.get(&current)
        {
            hops += 1;
            if hops > MAX_LINK_DEPTH {
                return None;
            }
            resolved.pop();
            if target.starts_with('/') {
                resolved.clear();
            }
            pending.extend(target.split('/').rev().map(String::from));
        }
    }

    Some(format!("/{}", resolved.join("/")))
}

/// Follows symlinks from `path` within `tree` until a regular file is reached.
///
/// Returns the real path and the file entry, or `None` if the path is missing,
/// is a directory, or the link chain is broken or too deep.
pub fn resolve_file<'t>(tree: &'t Tree, path: &str) -> Option<(String, &'t Entry)> {
    let real_path = resolve_real_path(tree, path)?;
    let entry = tree.get(&real_path).filter(|e| e.is_file())?;
    Some((real_path, entry))
}

/// Whether `path` names a file or directory in `tree` once symlinks are followed.
/// Directories count even when only implied by the entries below them.
pub fn path_exists(tree: &Tree, path: &str) -> bool {
    let Some(real_path) = resolve_real_path(tree, path) else {
        return false;
    };
    if tree.contains_key(&real_path) {
        return true;
    }
    let prefix = if real_path == "/" {
        real_path
    } else {
        format!("{}/", real_path)
    };
    tree.range(prefix.clone()..)
        .next()
        .is_some_and(|(key, _)| key.starts_with(&prefix))
}

/// Normalizes a path to absolute form without `.`, `..`, duplicate or trailing slashes.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Builds an in-memory image, one layer at a time.
#[derive(Default)]
pub struct ImageBuilder {
    layers: Vec<Layer>,
    next_id: u64,
}

impl ImageBuilder {
    pub fn layer(mut self, build: impl FnOnce(LayerBuilder) -> LayerBuilder) -> Self {
        let index = self.layers.len();
        let pending = build(LayerBuilder::default());

        let mut layer = Layer::empty(index, format!("layer-{}", index));
        for (path, kind) in pending.entries {
            layer.insert(&path, kind, &mut self.next_id);
        }
        self.layers.push(layer);
        self
    }

    pub fn build(self) -> Image {
        let mut layers = self.layers;
        if layers.is_empty() {
            layers.push(Layer::empty(0, "layer-0"));
        }
        Image::from_layers(layers)
    }

    /// Wraps the image for sharing between resolvers.
    pub fn build_shared(self) -> Arc<Image> {
        Arc::new(self.build())
    }
}

#[derive(Default)]
pub struct LayerBuilder {
    entries: Vec<(String, EntryKind)>,
}

impl LayerBuilder {
    pub fn file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        let bytes: Arc<[u8]> = Arc::from(content.as_ref());
        self.entries
            .push((path.to_string(), EntryKind::File(Content::Inline(bytes))));
        self
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.entries.push((path.to_string(), EntryKind::Dir));
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        self.entries
            .push((path.to_string(), EntryKind::Symlink(target.to_string())));
        self
    }

    /// Deletes `path` (and anything below it) from lower layers.
    pub fn whiteout(mut self, path: &str) -> Self {
        let cleaned = clean_path(path);
        let (parent, name) = layer::split_parent(&cleaned);
        let marker = format!("{}/{}{}", parent, WHITEOUT_PREFIX, name);
        self.entries.push((marker, EntryKind::Dir));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(image: &Image, reference: &FileRef) -> String {
        let mut out = String::new();
        image
            .file_contents(reference)
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("a/b"), "/a/b");
        assert_eq!(clean_path("/a//b/./c/"), "/a/b/c");
        assert_eq!(clean_path("/a/b/../c"), "/a/c");
        assert_eq!(clean_path("/../.."), "/");
    }

    #[test]
    fn test_squash_is_last_writer_wins() {
        let image = Image::builder()
            .layer(|l| l.file("/a", "one").file("/b", "keep"))
            .layer(|l| l.file("/a", "two"))
            .build();

        let entry = image.squashed().get("/a").unwrap();
        assert_eq!(read_all(&image, &entry.reference), "two");
        assert_eq!(image.layer_of(&entry.reference), Some(1));
        assert!(image.squashed().contains_key("/b"));
        assert_ne!(image.squash_at(0).unwrap().get("/a").unwrap().reference, entry.reference);
    }

    #[test]
    fn test_whiteout_removes_lower_file() {
        let image = Image::builder()
            .layer(|l| l.file("/etc/secret", "x"))
            .layer(|l| l.whiteout("/etc/secret"))
            .build();

        assert!(image.squash_at(0).unwrap().contains_key("/etc/secret"));
        assert!(!image.squashed().contains_key("/etc/secret"));
    }

    #[test]
    fn test_resolve_file_follows_links() {
        let image = Image::builder()
            .layer(|l| {
                l.file("/usr/lib/libfoo.so.1", "elf")
                    .symlink("/usr/lib/libfoo.so", "libfoo.so.1")
                    .symlink("/lib", "/usr/lib")
                    .symlink("/loop", "/loop")
            })
            .build();

        let (real, entry) = resolve_file(image.squashed(), "/usr/lib/libfoo.so").unwrap();
        assert_eq!(real, "/usr/lib/libfoo.so.1");
        assert!(entry.is_file());
        assert!(resolve_file(image.squashed(), "/lib").is_none());
        assert!(resolve_file(image.squashed(), "/loop").is_none());
        assert!(resolve_file(image.squashed(), "/missing").is_none());
    }

    #[test]
    fn test_resolve_file_through_ancestor_links() {
        let image = Image::builder()
            .layer(|l| {
                l.file("/usr/lib/python3/site.py", "py")
                    .symlink("/lib", "/usr/lib")
                    .symlink("/usr/lib/py", "python3")
                    .symlink("/opt/up", "../usr")
            })
            .build();
        let tree = image.squashed();

        let (real, _) = resolve_file(tree, "/lib/python3/site.py").unwrap();
        assert_eq!(real, "/usr/lib/python3/site.py");
        let (real, _) = resolve_file(tree, "/lib/py/site.py").unwrap();
        assert_eq!(real, "/usr/lib/python3/site.py");
        let (real, _) = resolve_file(tree, "/opt/up/lib/python3/site.py").unwrap();
        assert_eq!(real, "/usr/lib/python3/site.py");

        assert!(path_exists(tree, "/lib/python3"));
        assert!(path_exists(tree, "/lib"));
        assert!(!path_exists(tree, "/lib/python2"));
        assert!(!path_exists(tree, "/us"));
    }

    #[test]
    fn test_file_contents_rejects_unknown_reference() {
        let image = Image::builder().layer(|l| l.file("/a", "x")).build();
        let stale = FileRef::new(999, "/a".to_string());
        assert!(matches!(image.file_contents(&stale), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_open_reads_manifest_and_layers() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("base/etc")).unwrap();
        fs::write(tmp.path().join("base/etc/issue"), "base").unwrap();
        fs::create_dir_all(tmp.path().join("app/etc")).unwrap();
        fs::write(tmp.path().join("app/etc/issue"), "app").unwrap();
        fs::write(
            tmp.path().join(MANIFEST_FILE),
            r#"{"layers": ["base", "app"]}"#,
        )
        .unwrap();

        let image = Image::open(tmp.path()).unwrap();
        assert_eq!(image.layers().len(), 2);
        assert_eq!(image.layers()[0].id, "base");

        let entry = image.squashed().get("/etc/issue").unwrap();
        assert_eq!(read_all(&image, &entry.reference), "app");
    }

    #[test]
    fn test_open_rejects_missing_layer_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), r#"{"layers": ["nope"]}"#).unwrap();
        assert!(matches!(Image::open(tmp.path()), Err(Error::Source { .. })));
    }

    #[test]
    fn test_stale_disk_content_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("base")).unwrap();
        fs::write(tmp.path().join("base/gone"), "x").unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), r#"{"layers": ["base"]}"#).unwrap();

        let image = Image::open(tmp.path()).unwrap();
        let reference = image.squashed().get("/gone").unwrap().reference.clone();
        fs::remove_file(tmp.path().join("base/gone")).unwrap();

        assert!(matches!(image.file_contents(&reference), Err(Error::NotFound(_))));
    }
}
