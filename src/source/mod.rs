//! Source resolution.
//!
//! A [`Resolver`] answers "which files match this path or glob" and "what is
//! in this file" the same way for a plain directory, the squashed view of an
//! image, or every layer of an image. [`resolve`] picks the right one for a
//! source specifier and a [`Scope`].

mod all_layers;
mod directory;
mod location;
mod resolver;
mod squash;

pub use all_layers::AllLayersResolver;
pub use directory::DirectoryResolver;
pub use location::{Location, Reference};
pub use resolver::{ContentResolver, PathResolver, Resolver};
pub use squash::SquashResolver;

use crate::error::{Error, Result};
use crate::image::{Image, MANIFEST_FILE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Which view of an image the resolver sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    /// The merged filesystem as seen at the top layer.
    #[default]
    Squashed,
    /// Every layer separately, including content later layers shadow.
    AllLayers,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Squashed => "squashed",
            Scope::AllLayers => "all-layers",
        }
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "squashed" => Ok(Scope::Squashed),
            "all-layers" | "alllayers" => Ok(Scope::AllLayers),
            _ => Err(Error::UnsupportedScope(s.to_string())),
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_str().to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Releases whatever a source holds open. Runs at most once, either through
/// [`Cleanup::run`] or when dropped.
///
/// For an image the guard gives up the source's own handle; the resolver
/// keeps another, so the image is freed only once the resolver is dropped too.
#[must_use = "dropping the guard releases the source immediately"]
pub struct Cleanup {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Cleanup {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn run(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup")
            .field("pending", &self.release.is_some())
            .finish()
    }
}

/// An opened source, before a scope is chosen.
#[derive(Debug, Clone)]
pub enum Source {
    Image(Arc<Image>),
    Directory(PathBuf),
}

impl Source {
    /// Opens a source from a specifier.
    ///
    /// `dir:<path>` and `image:<path>` pick the kind explicitly; a bare path
    /// is an image when it holds a `manifest.json` and a directory otherwise.
    pub fn open(specifier: &str) -> Result<Self> {
        let (kind, path) = match specifier.split_once(':') {
            Some(("dir", path)) => (Some(SourceKind::Directory), path),
            Some(("image", path)) => (Some(SourceKind::Image), path),
            _ => (None, specifier),
        };

        let path = Path::new(path);
        if !path.exists() {
            return Err(Error::Source {
                specifier: specifier.to_string(),
                reason: "no such file or directory".to_string(),
            });
        }

        let kind = kind.unwrap_or_else(|| {
            if path.join(MANIFEST_FILE).is_file() {
                SourceKind::Image
            } else {
                SourceKind::Directory
            }
        });

        debug!(specifier, ?kind, "opening source");
        match kind {
            SourceKind::Image => Ok(Source::Image(Arc::new(Image::open(path)?))),
            SourceKind::Directory => Ok(Source::Directory(path.to_path_buf())),
        }
    }

    /// Builds the resolver for `scope`. Directories have no layers, so they ignore it.
    pub fn resolver(&self, scope: Scope) -> Result<Box<dyn Resolver>> {
        match self {
            Source::Image(image) => Ok(image_resolver(Arc::clone(image), scope)),
            Source::Directory(path) => Ok(Box::new(DirectoryResolver::new(path)?)),
        }
    }

    /// Builds the resolver for `scope` and hands ownership of the source to its release guard.
    ///
    /// Running the guard while the resolver is alive is safe: resolvers share
    /// the image, so queries keep working until the resolver itself goes.
    pub fn into_resolver(self, scope: Scope) -> Result<(Box<dyn Resolver>, Cleanup)> {
        let resolver = self.resolver(scope)?;
        let cleanup = match self {
            Source::Image(image) => Cleanup::new(move || {
                let layers = image.layers().len();
                drop(image);
                debug!(layers, "released image");
            }),
            Source::Directory(_) => Cleanup::noop(),
        };
        Ok((resolver, cleanup))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Source::Image(_) => "image",
            Source::Directory(_) => "directory",
        }
    }

    pub fn image(&self) -> Option<&Arc<Image>> {
        match self {
            Source::Image(image) => Some(image),
            Source::Directory(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SourceKind {
    Image,
    Directory,
}

/// The resolver for `scope` over an already opened image.
pub fn image_resolver(image: Arc<Image>, scope: Scope) -> Box<dyn Resolver> {
    match scope {
        Scope::Squashed => Box::new(SquashResolver::new(image)),
        Scope::AllLayers => Box::new(AllLayersResolver::new(image)),
    }
}

/// Opens `specifier` and returns the resolver for `scope` with its release guard.
pub fn resolve(scope: Scope, specifier: &str) -> Result<(Box<dyn Resolver>, Cleanup)> {
    Source::open(specifier)?.into_resolver(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write_image(root: &Path) {
        fs::create_dir_all(root.join("base/etc")).unwrap();
        fs::create_dir_all(root.join("app/etc")).unwrap();
        fs::write(root.join("base/etc/motd"), "base").unwrap();
        fs::write(root.join("app/etc/motd"), "app").unwrap();
        fs::write(root.join(MANIFEST_FILE), r#"{"layers": ["base", "app"]}"#).unwrap();
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("squashed".parse::<Scope>().unwrap(), Scope::Squashed);
        assert_eq!("Squashed".parse::<Scope>().unwrap(), Scope::Squashed);
        assert_eq!("all-layers".parse::<Scope>().unwrap(), Scope::AllLayers);
        assert_eq!("AllLayers".parse::<Scope>().unwrap(), Scope::AllLayers);
        assert_eq!(Scope::default(), Scope::Squashed);

        let err = "everything".parse::<Scope>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedScope(s) if s == "everything"));
    }

    #[test]
    fn test_cleanup_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        Cleanup::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .run();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = Arc::clone(&count);
        {
            let _guard = Cleanup::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resolve_image_by_scope() {
        let tmp = tempfile::tempdir().unwrap();
        write_image(tmp.path());
        let specifier = tmp.path().to_str().unwrap();

        let (squashed, cleanup) = resolve(Scope::Squashed, specifier).unwrap();
        assert_eq!(squashed.files_by_path(&["/etc/motd"]).unwrap().len(), 1);
        cleanup.run();

        let (all, _cleanup) = resolve(Scope::AllLayers, &format!("image:{}", specifier)).unwrap();
        assert_eq!(all.files_by_path(&["/etc/motd"]).unwrap().len(), 2);
    }

    #[test]
    fn test_image_freed_after_guard_and_resolver() {
        let tmp = tempfile::tempdir().unwrap();
        write_image(tmp.path());

        let source = Source::open(tmp.path().to_str().unwrap()).unwrap();
        let image = Arc::downgrade(source.image().unwrap());
        let (resolver, cleanup) = source.into_resolver(Scope::Squashed).unwrap();

        cleanup.run();
        assert!(image.upgrade().is_some());
        assert_eq!(resolver.files_by_path(&["/etc/motd"]).unwrap().len(), 1);

        drop(resolver);
        assert!(image.upgrade().is_none());
    }

    #[test]
    fn test_resolve_directory_ignores_scope() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("motd"), "hi").unwrap();
        let specifier = format!("dir:{}", tmp.path().display());

        let (resolver, _cleanup) = resolve(Scope::AllLayers, &specifier).unwrap();
        assert_eq!(resolver.files_by_path(&["/motd"]).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_missing_source() {
        assert!(matches!(
            resolve(Scope::Squashed, "/no/such/source"),
            Err(Error::Source { .. })
        ));
    }
}
