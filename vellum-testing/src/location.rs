// Mock browser location

use parking_lot::{Mutex, RwLock};
use vellum_core::Location;

/// A history write made by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationWrite {
    SetHash(String),
    Push(String),
    Replace(String),
}

#[derive(Debug, Default)]
struct Url {
    hash: String,
    pathname: String,
    search: String,
}

/// In-memory `window.location` that records writes.
#[derive(Debug)]
pub struct MockLocation {
    url: RwLock<Url>,
    writes: Mutex<Vec<LocationWrite>>,
}

impl Default for MockLocation {
    fn default() -> Self {
        Self::at("/")
    }
}

impl MockLocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location at `pathname` (which may carry a search string).
    pub fn at(path: &str) -> Self {
        let location = Self {
            url: RwLock::new(Url::default()),
            writes: Mutex::new(Vec::new()),
        };
        location.apply_path(path);
        location
    }

    /// Location at `/` with the given hash.
    pub fn with_hash(hash: &str) -> Self {
        let location = Self::default();
        location.url.write().hash = hash.to_string();
        location
    }

    /// Simulate the user editing the hash. Not recorded as a write.
    pub fn visit_hash(&self, hash: &str) {
        self.url.write().hash = hash.to_string();
    }

    /// Simulate back/forward to `path`. Not recorded as a write.
    pub fn visit_path(&self, path: &str) {
        self.apply_path(path);
    }

    pub fn writes(&self) -> Vec<LocationWrite> {
        self.writes.lock().clone()
    }

    pub fn last_write(&self) -> Option<LocationWrite> {
        self.writes.lock().last().cloned()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// `pathname + search`.
    pub fn path(&self) -> String {
        let url = self.url.read();
        format!("{}{}", url.pathname, url.search)
    }

    fn apply_path(&self, path: &str) {
        let mut url = self.url.write();
        match path.split_once('?') {
            Some((pathname, search)) => {
                url.pathname = pathname.to_string();
                url.search = format!("?{search}");
            }
            None => {
                url.pathname = path.to_string();
                url.search = String::new();
            }
        }
    }
}

impl Location for MockLocation {
    fn hash(&self) -> String {
        self.url.read().hash.clone()
    }

    fn pathname(&self) -> String {
        self.url.read().pathname.clone()
    }

    fn search(&self) -> String {
        self.url.read().search.clone()
    }

    fn set_hash(&self, hash: &str) {
        self.url.write().hash = hash.to_string();
        self.writes.lock().push(LocationWrite::SetHash(hash.to_string()));
    }

    fn push_state(&self, url: &str) {
        self.apply_path(url);
        self.writes.lock().push(LocationWrite::Push(url.to_string()));
    }

    fn replace_state(&self, url: &str) {
        self.apply_path(url);
        self.writes.lock().push(LocationWrite::Replace(url.to_string()));
    }
}
