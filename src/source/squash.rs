use crate::error::{Error, Result};
use crate::glob::{glob_match, validate_pattern};
use crate::image::{clean_path, path_exists, resolve_file, Image, Tree};
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

use super::{ContentResolver, Location, PathResolver, Reference};

/// Resolves paths against the merged (last-writer-wins) view of an image.
pub struct SquashResolver {
    image: Arc<Image>,
}

impl SquashResolver {
    pub fn new(image: Arc<Image>) -> Self {
        Self { image }
    }
}

impl ContentResolver for SquashResolver {
    fn file_content_by_location(&self, location: &Location) -> Result<Box<dyn Read + Send>> {
        image_content(&self.image, location)
    }
}

impl PathResolver for SquashResolver {
    fn has_path(&self, path: &str) -> bool {
        path_exists(self.image.squashed(), path)
    }

    fn files_by_path(&self, paths: &[&str]) -> Result<Vec<Location>> {
        let tree = self.image.squashed();
        Ok(paths
            .iter()
            .filter_map(|path| locate(&self.image, tree, path))
            .collect())
    }

    fn files_by_glob(&self, patterns: &[&str]) -> Result<Vec<Location>> {
        for pattern in patterns {
            validate_pattern(pattern)?;
        }

        let tree = self.image.squashed();
        let mut seen = HashSet::new();
        let mut locations = Vec::new();

        for pattern in patterns {
            for path in tree.keys().filter(|p| glob_match(pattern, p)) {
                if let Some(location) = locate(&self.image, tree, path) {
                    if seen.insert((location.reference().clone(), location.path().to_string())) {
                        locations.push(location);
                    }
                }
            }
        }

        debug!(?patterns, matches = locations.len(), "squash glob");
        Ok(locations)
    }

    fn relative_file_by_path(&self, anchor: &Location, path: &str) -> Option<Location> {
        relative_to_anchor(&self.image, anchor, path)
    }
}

/// Resolves `path` to a file location inside `tree`, following symlinks.
pub(super) fn locate(image: &Image, tree: &Tree, path: &str) -> Option<Location> {
    let (real_path, entry) = resolve_file(tree, path)?;
    let location = Location::new(real_path, clean_path(path), Reference::Image(entry.reference.clone()));
    Some(match image.layer_of(&entry.reference) {
        Some(layer) => location.in_layer(layer),
        None => location,
    })
}

pub(super) fn image_content(image: &Image, location: &Location) -> Result<Box<dyn Read + Send>> {
    match location.reference() {
        Reference::Image(reference) => image.file_contents(reference),
        Reference::Host(_) => Err(Error::NotFound(location.real_path.clone())),
    }
}

/// Looks `path` up in the squash as of the layer that produced `anchor`.
pub(super) fn relative_to_anchor(image: &Image, anchor: &Location, path: &str) -> Option<Location> {
    let Reference::Image(reference) = anchor.reference() else {
        return None;
    };
    let layer = image.layer_of(reference)?;
    let tree = image.squash_at(layer)?;
    locate(image, tree, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_layer_image() -> Arc<Image> {
        Image::builder()
            .layer(|l| l.file("/a", "one").file("/lib/base.txt", "base"))
            .layer(|l| l.file("/a", "two").symlink("/current", "/a"))
            .layer(|l| l.file("/a", "three").file("/late.txt", "late"))
            .build_shared()
    }

    #[test]
    fn test_files_by_path_returns_single_winner() {
        let resolver = SquashResolver::new(three_layer_image());

        let locations = resolver.files_by_path(&["/a"]).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].layer_index, Some(2));

        let mut body = String::new();
        resolver
            .file_content_by_location(&locations[0])
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "three");
    }

    #[test]
    fn test_files_by_path_follows_symlinks() {
        let resolver = SquashResolver::new(three_layer_image());

        let locations = resolver.files_by_path(&["/current"]).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].real_path, "/a");
        assert_eq!(locations[0].virtual_path.as_deref(), Some("/current"));
    }

    #[test]
    fn test_files_by_path_follows_ancestor_links() {
        let image = Image::builder()
            .layer(|l| {
                l.file("/usr/lib/python3/site-packages/six.egg-info/PKG-INFO", "six")
                    .symlink("/lib", "/usr/lib")
            })
            .build_shared();
        let resolver = SquashResolver::new(image);

        let locations = resolver
            .files_by_path(&["/lib/python3/site-packages/six.egg-info/PKG-INFO"])
            .unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(
            locations[0].real_path,
            "/usr/lib/python3/site-packages/six.egg-info/PKG-INFO"
        );
        assert!(resolver.has_path("/lib/python3"));
        assert!(!resolver.has_path("/lib/python2"));
    }

    #[test]
    fn test_missing_path_is_empty_not_error() {
        let resolver = SquashResolver::new(three_layer_image());
        assert!(resolver.files_by_path(&["/nope"]).unwrap().is_empty());
        assert!(!resolver.has_path("/nope"));
        assert!(resolver.has_path("/lib/base.txt"));
    }

    #[test]
    fn test_files_by_glob() {
        let resolver = SquashResolver::new(three_layer_image());

        let locations = resolver.files_by_glob(&["**/*.txt"]).unwrap();
        let paths: Vec<_> = locations.iter().map(|l| l.real_path.as_str()).collect();
        assert_eq!(paths, vec!["/late.txt", "/lib/base.txt"]);

        assert!(resolver.files_by_glob(&[""]).is_err());
    }

    #[test]
    fn test_relative_file_hides_later_layers() {
        let image = three_layer_image();
        let resolver = SquashResolver::new(Arc::clone(&image));

        let anchor = locate(&image, image.squash_at(0).unwrap(), "/lib/base.txt").unwrap();
        assert!(resolver.relative_file_by_path(&anchor, "/late.txt").is_none());

        let sibling = resolver.relative_file_by_path(&anchor, "/a").unwrap();
        assert_eq!(sibling.layer_index, Some(0));
    }
}
