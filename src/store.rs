use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

// Timestamps of admitted requests for one client, in arrival order
pub type Window = Vec<Instant>;

// Per-client request windows.
//
// Invariant: every key present maps to a non-empty window. Both primitives
// below drop a key as soon as its window is left empty. The store never looks
// at the timestamps; callers decide what is expired.
#[derive(Default)]
pub struct WindowStore {
    windows: DashMap<String, Window>,
}

impl WindowStore {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Run `f` on the window for `key` while holding exclusive access to it.
    ///
    /// An absent key is handed to `f` as an empty window. If `f` leaves the
    /// window empty the key is removed (or never inserted).
    pub fn with_window<R>(&self, key: &str, f: impl FnOnce(&mut Window) -> R) -> R {
        match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let out = f(occupied.get_mut());
                if occupied.get().is_empty() {
                    occupied.remove();
                }
                out
            }
            Entry::Vacant(vacant) => {
                let mut window = Window::new();
                let out = f(&mut window);
                if !window.is_empty() {
                    vacant.insert(window);
                }
                out
            }
        }
    }

    /// Visit every window, dropping the keys whose window `f` leaves empty.
    pub fn sweep(&self, mut f: impl FnMut(&str, &mut Window)) {
        self.windows.retain(|key, window| {
            f(key, window);
            !window.is_empty()
        });
    }

    /// Number of timestamps currently stored for `key`.
    pub fn window_len(&self, key: &str) -> Option<usize> {
        self.windows.get(key).map(|window| window.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_is_created_lazily() {
        let store = WindowStore::new();
        let seen = store.with_window("ip1", |window| {
            let before = window.len();
            window.push(Instant::now());
            before
        });
        assert_eq!(seen, 0);
        assert_eq!(store.window_len("ip1"), Some(1));
    }

    #[test]
    fn empty_window_is_never_stored() {
        let store = WindowStore::new();
        store.with_window("ip1", |_| ());
        assert!(store.is_empty());

        store.with_window("ip1", |window| window.push(Instant::now()));
        store.with_window("ip1", |window| window.clear());
        assert_eq!(store.window_len("ip1"), None);
    }

    #[test]
    fn sweep_drops_emptied_keys_only() {
        let store = WindowStore::new();
        store.with_window("keep", |window| window.push(Instant::now()));
        store.with_window("drop", |window| window.push(Instant::now()));

        store.sweep(|key, window| {
            if key == "drop" {
                window.clear();
            }
        });

        assert_eq!(store.len(), 1);
        assert_eq!(store.window_len("keep"), Some(1));
    }
}
