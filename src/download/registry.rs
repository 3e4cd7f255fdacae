// src/download/registry.rs
// =============================================================================
// Book-keeping for which image URLs have been downloaded and which local file
// names are in use.
//
// All state sits behind one mutex. Every check-then-claim sequence happens
// inside a single lock, so two concurrent downloads can never both claim the
// same URL or the same file name.
//
// Rust concepts:
// - parking_lot::Mutex: lock() returns the guard directly (no poisoning)
// - Interior mutability: the registry is shared as &ImageRegistry by every
//   download future, yet still updates its state
// =============================================================================

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::crawl::normalize::ImageUrl;
use crate::download::filename::{part_name, with_counter};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    /// Claimed by a worker; the file name is known once the body arrived.
    InFlight(Option<String>),
    Saved(String),
}

#[derive(Debug, Default)]
struct Inner {
    urls: HashMap<ImageUrl, Status>,
    /// Lowercased, so names differing only in case never share a file on
    /// case-insensitive filesystems.
    taken: HashSet<String>,
}

impl Inner {
    fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(&name.to_lowercase())
            || self.taken.contains(&part_name(name).to_lowercase())
    }
}

/// Maps image URLs to their download state and assigned file name.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    inner: Mutex<Inner>,
}

impl ImageRegistry {
    /// A registry that treats `existing` file names as already in use.
    pub fn with_taken_names<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let taken = existing
            .into_iter()
            .map(|name| name.as_ref().to_lowercase())
            .collect();
        Self {
            inner: Mutex::new(Inner {
                urls: HashMap::new(),
                taken,
            }),
        }
    }

    /// Claims `url` for downloading. Returns false when it is already saved
    /// or another worker is busy with it.
    pub fn begin(&self, url: &ImageUrl) -> bool {
        let mut inner = self.inner.lock();
        if inner.urls.contains_key(url) {
            return false;
        }
        inner.urls.insert(url.clone(), Status::InFlight(None));
        true
    }

    /// Reserves a unique file name for `url`, starting from `preferred` and
    /// falling back to `stem-1.ext`, `stem-2.ext`, ...
    ///
    /// The name's temporary `.name.part` twin is reserved along with it, so
    /// neither can land on a file somebody else owns.
    pub fn reserve_name(&self, url: &ImageUrl, preferred: &str) -> String {
        let mut inner = self.inner.lock();

        let mut name = preferred.to_string();
        let mut counter = 1;
        while inner.is_taken(&name) {
            name = with_counter(preferred, counter);
            counter += 1;
        }

        inner.taken.insert(name.to_lowercase());
        inner.taken.insert(part_name(&name).to_lowercase());
        inner
            .urls
            .insert(url.clone(), Status::InFlight(Some(name.clone())));
        name
    }

    /// Marks `url` as written to disk.
    pub fn commit(&self, url: &ImageUrl) {
        let mut inner = self.inner.lock();
        if let Some(Status::InFlight(Some(name))) = inner.urls.get(url).cloned() {
            inner.urls.insert(url.clone(), Status::Saved(name));
        }
    }

    /// Forgets an unfinished claim so a later attempt may retry. Any
    /// reserved name becomes free again because no file was written.
    pub fn release(&self, url: &ImageUrl) {
        let mut inner = self.inner.lock();
        if let Some(Status::InFlight(name)) = inner.urls.get(url).cloned() {
            inner.urls.remove(url);
            if let Some(name) = name {
                inner.taken.remove(&name.to_lowercase());
                inner.taken.remove(&part_name(&name).to_lowercase());
            }
        }
    }

    pub fn saved_count(&self) -> usize {
        self.inner
            .lock()
            .urls
            .values()
            .filter(|status| matches!(status, Status::Saved(_)))
            .count()
    }
}
