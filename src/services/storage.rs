use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use web_sys::window;

/// Durable string key/value storage.
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// The browser's `window.localStorage`.
pub struct LocalStorage;

impl LocalStorage {
    fn storage() -> Result<web_sys::Storage> {
        let window = window().ok_or_else(|| anyhow!("no window available"))?;
        window
            .local_storage()
            .map_err(|e| anyhow!("localStorage access denied: {e:?}"))?
            .ok_or_else(|| anyhow!("localStorage is not available"))
    }
}

impl KeyValueStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        Self::storage().ok()?.get_item(key).ok()?
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| anyhow!("failed to write {key}: {e:?}"))
    }
}

/// Process-local storage. Stands in when `localStorage` is denied (some
/// private browsing modes), so history lasts only until the page reloads.
#[derive(Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// `localStorage` when the browser grants it, otherwise [`MemoryStorage`].
pub fn browser_storage() -> Rc<dyn KeyValueStorage> {
    or_memory(LocalStorage::storage().map(|_| LocalStorage))
}

fn or_memory<S: KeyValueStorage + 'static>(preferred: Result<S>) -> Rc<dyn KeyValueStorage> {
    match preferred {
        Ok(storage) => Rc::new(storage),
        Err(err) => {
            tracing::warn!(error = %err, "localStorage unavailable, chats will not survive a reload");
            Rc::new(MemoryStorage::new())
        }
    }
}

/// Reads and deserializes `key`. Missing keys are `Ok(None)`.
pub fn load<T: for<'de> Deserialize<'de>>(storage: &dyn KeyValueStorage, key: &str) -> Result<Option<T>> {
    let Some(json) = storage.get_item(key) else {
        return Ok(None);
    };
    let value = serde_json::from_str(&json).with_context(|| format!("corrupt value under {key}"))?;
    Ok(Some(value))
}

pub fn save<T: Serialize + ?Sized>(storage: &dyn KeyValueStorage, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).with_context(|| format!("failed to serialize {key}"))?;
    storage.set_item(key, &json)
}
