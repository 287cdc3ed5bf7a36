//! Single-pass content indexing.
//!
//! An [`Indexer`] collects [`ContentObserver`]s and drives one content pass
//! over an image so every observer sees each file it cares about without the
//! image being read once per observer.

pub mod digest;

pub use digest::{DigestIndexer, FileDigest};

use crate::error::Result;
use crate::image::{ContentIterator, ContentObserver};
use tracing::debug;

#[derive(Default)]
pub struct Indexer<'a> {
    observers: Vec<&'a dyn ContentObserver>,
}

impl<'a> Indexer<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: &'a dyn ContentObserver) {
        self.observers.push(observer);
    }

    /// Runs one content pass, returning once every observer has drained.
    pub fn index(&self, iterator: &dyn ContentIterator) -> Result<()> {
        debug!(observers = self.observers.len(), "starting content pass");
        iterator.iterate_content(&self.observers)
    }
}

/// Registers `observers` and runs a single content pass over `iterator`.
pub fn index(iterator: &dyn ContentIterator, observers: &[&dyn ContentObserver]) -> Result<()> {
    let mut indexer = Indexer::new();
    for observer in observers {
        indexer.register(*observer);
    }
    indexer.index(iterator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ContentObservation, FileRef, Image};
    use std::sync::mpsc::Receiver;
    use std::sync::Mutex;

    #[derive(Default)]
    struct PathCollector {
        suffix: &'static str,
        seen: Mutex<Vec<String>>,
    }

    impl ContentObserver for PathCollector {
        fn is_interested_in(&self, reference: &FileRef) -> bool {
            reference.real_path().ends_with(self.suffix)
        }

        fn observe_content(&self, subscription: Receiver<ContentObservation>) {
            for observation in subscription {
                self.seen
                    .lock()
                    .unwrap()
                    .push(observation.entry.real_path().to_string());
            }
        }
    }

    #[test]
    fn test_index_delivers_to_each_interested_observer() {
        let image = Image::builder()
            .layer(|l| l.file("/a.txt", "1").file("/b.json", "{}"))
            .layer(|l| l.file("/a.txt", "2").file("/c.txt", "3"))
            .build();

        let text = PathCollector {
            suffix: ".txt",
            ..Default::default()
        };
        let json = PathCollector {
            suffix: ".json",
            ..Default::default()
        };

        index(&image, &[&text, &json]).unwrap();

        assert_eq!(*text.seen.lock().unwrap(), vec!["/a.txt", "/a.txt", "/c.txt"]);
        assert_eq!(*json.seen.lock().unwrap(), vec!["/b.json"]);
    }

    #[test]
    fn test_index_without_observers() {
        let image = Image::builder().layer(|l| l.file("/a", "x")).build();
        assert!(Indexer::new().index(&image).is_ok());
    }
}
