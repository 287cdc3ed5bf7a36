use crate::image::{ContentObservation, ContentObserver, FileRef};
use crate::source::{Location, Reference, Resolver};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::sync::mpsc::Receiver;
use std::sync::Mutex;
use tracing::warn;

pub const SHA256: &str = "sha256";

/// The digest of one file occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDigest {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_index: Option<usize>,
    pub algorithm: &'static str,
    pub value: String,
}

/// Records a SHA-256 digest for every file the resolver can see.
///
/// Files the resolver does not surface (content shadowed in a squashed
/// scope, for example) are skipped.
pub struct DigestIndexer<'r> {
    resolver: &'r dyn Resolver,
    digests: Mutex<Vec<FileDigest>>,
}

impl<'r> DigestIndexer<'r> {
    pub fn new(resolver: &'r dyn Resolver) -> Self {
        Self {
            resolver,
            digests: Mutex::new(Vec::new()),
        }
    }

    fn location_of(&self, reference: &FileRef) -> Option<Location> {
        let locations = self.resolver.files_by_path(&[reference.real_path()]).ok()?;
        locations
            .into_iter()
            .find(|l| matches!(l.reference(), Reference::Image(r) if r == reference))
    }

    /// The digests recorded so far, in observation order.
    pub fn into_digests(self) -> Vec<FileDigest> {
        self.digests.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl ContentObserver for DigestIndexer<'_> {
    fn is_interested_in(&self, reference: &FileRef) -> bool {
        self.location_of(reference).is_some()
    }

    fn observe_content(&self, subscription: Receiver<ContentObservation>) {
        for mut observation in subscription {
            let path = observation.entry.real_path().to_string();
            let value = match sha256_hex(&mut observation.content) {
                Ok(value) => value,
                Err(e) => {
                    warn!(path = %path, error = %e, "failed to read content for digest");
                    continue;
                }
            };

            let digest = FileDigest {
                layer_index: self.location_of(&observation.entry).and_then(|l| l.layer_index),
                path,
                algorithm: SHA256,
                value,
            };
            self.digests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(digest);
        }
    }
}

fn sha256_hex(reader: &mut dyn Read) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;
    use crate::indexer::index;
    use crate::source::{AllLayersResolver, SquashResolver};

    // sha256("hello")
    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn image() -> std::sync::Arc<Image> {
        Image::builder()
            .layer(|l| l.file("/greeting", "bye").file("/etc/hostname", "hello"))
            .layer(|l| l.file("/greeting", "hello"))
            .build_shared()
    }

    #[test]
    fn test_squashed_scope_digests_visible_files_only() {
        let image = image();
        let resolver = SquashResolver::new(image.clone());
        let digests = DigestIndexer::new(&resolver);

        index(image.as_ref(), &[&digests]).unwrap();

        let digests = digests.into_digests();
        assert_eq!(digests.len(), 2);
        assert!(digests.iter().all(|d| d.value == HELLO && d.algorithm == SHA256));

        let greeting = digests.iter().find(|d| d.path == "/greeting").unwrap();
        assert_eq!(greeting.layer_index, Some(1));
    }

    #[test]
    fn test_all_layers_scope_digests_shadowed_files() {
        let image = image();
        let resolver = AllLayersResolver::new(image.clone());
        let digests = DigestIndexer::new(&resolver);

        index(image.as_ref(), &[&digests]).unwrap();

        let greetings: Vec<_> = digests
            .into_digests()
            .into_iter()
            .filter(|d| d.path == "/greeting")
            .map(|d| d.layer_index)
            .collect();
        assert_eq!(greetings, vec![Some(0), Some(1)]);
    }
}
