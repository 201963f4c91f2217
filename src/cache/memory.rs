use super::{CacheError, Store};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

#[derive(Default)]
struct State {
    now: Cell<u64>,
    entries: RefCell<HashMap<String, (String, u64)>>,
}

/// In-process store with a manual clock. Clones share the same entries,
/// so a test can keep a handle after moving one into a `TtlCache`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Rc<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.state.now.set(self.state.now.get() + by.as_secs());
    }

    /// Write a raw value, bypassing JSON encoding.
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        let expires = self.state.now.get() + ttl.as_secs();
        self.state
            .entries
            .borrow_mut()
            .insert(key.to_string(), (value.to_string(), expires));
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.get_live(key)
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let entries = self.state.entries.borrow();
        let (_, expires) = entries.get(key)?;
        Some(Duration::from_secs(expires.saturating_sub(self.state.now.get())))
    }

    pub fn len(&self) -> usize {
        self.state.entries.borrow().len()
    }

    fn get_live(&self, key: &str) -> Option<String> {
        let entries = self.state.entries.borrow();
        let (value, expires) = entries.get(key)?;
        (*expires > self.state.now.get()).then(|| value.clone())
    }
}

impl Store for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.get_live(key))
    }

    fn set_ex(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.insert_raw(key, value, ttl.max(Duration::from_secs(1)));
        Ok(())
    }
}

/// Store whose every call fails with the given error kind.
pub struct FailingStore {
    pub connection: bool,
    pub calls: Rc<Cell<usize>>,
}

impl FailingStore {
    fn fail(&self) -> CacheError {
        self.calls.set(self.calls.get() + 1);
        if self.connection {
            CacheError::Connection("connection reset".into())
        } else {
            CacheError::Command("WRONGTYPE".into())
        }
    }
}

impl Store for FailingStore {
    fn get(&mut self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(self.fail())
    }

    fn set_ex(&mut self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(self.fail())
    }
}
