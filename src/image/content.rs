//! Single-pass content iteration with observer fan-out.
//!
//! Each observer gets its own rendezvous channel and runs on its own scoped
//! thread. The producer walks every file once and blocks until every
//! interested observer has taken the observation, so there is never more than
//! one in-flight stream per observer. A slow observer stalls the whole pass;
//! observers must drain their receiver promptly and drop each stream when done.

use crate::error::Result;
use std::io::Read;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread;
use tracing::{debug, warn};

use super::FileRef;

/// One file handed to one observer.
pub struct ContentObservation {
    pub entry: FileRef,
    pub content: Box<dyn Read + Send>,
}

impl std::fmt::Debug for ContentObservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentObservation")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

/// A consumer of file content during a content pass.
pub trait ContentObserver: Sync {
    /// Called by the producer for every file; only matching files are delivered.
    fn is_interested_in(&self, reference: &FileRef) -> bool;

    /// Drains the subscription until the producer closes it.
    fn observe_content(&self, subscription: Receiver<ContentObservation>);
}

/// Anything that can drive one full content pass over a set of observers.
pub trait ContentIterator {
    fn iterate_content(&self, observers: &[&dyn ContentObserver]) -> Result<()>;
}

/// Runs a content pass over `files` (in order), delivering to every interested observer.
///
/// `open` produces a fresh reader for a reference; each observer receives its own.
pub(crate) fn fan_out<'a, I, F>(files: I, observers: &[&dyn ContentObserver], open: F) -> Result<()>
where
    I: IntoIterator<Item = &'a FileRef>,
    F: Fn(&FileRef) -> Result<Box<dyn Read + Send>>,
{
    thread::scope(|scope| {
        let mut senders: Vec<(&dyn ContentObserver, SyncSender<ContentObservation>)> =
            Vec::with_capacity(observers.len());

        for observer in observers {
            let (tx, rx) = sync_channel(0);
            let observer: &dyn ContentObserver = *observer;
            scope.spawn(move || observer.observe_content(rx));
            senders.push((observer, tx));
        }

        let mut delivered = 0usize;
        for reference in files {
            for (observer, tx) in &senders {
                if !observer.is_interested_in(reference) {
                    continue;
                }
                let content = open(reference)?;
                let observation = ContentObservation {
                    entry: reference.clone(),
                    content,
                };
                if tx.send(observation).is_err() {
                    warn!(path = %reference.real_path(), "observer hung up before the pass finished");
                    continue;
                }
                delivered += 1;
            }
        }

        debug!(observers = senders.len(), delivered, "content pass complete");
        // senders drop here, closing every subscription; the scope joins the observers
        Ok(())
    })
}
