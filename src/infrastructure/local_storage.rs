use crate::domain::cart::{Cart, CartItem, ProductId};
use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CART_KEY: &str = "cart";
pub const FAVORITES_KEY: &str = "favorites";

/// Client-local key/value document persisted as a single JSON object.
///
/// Each key holds a JSON array. It survives restarts but is not a system of
/// record: a missing or unreadable entry simply loads as empty, and array
/// elements that fail to deserialize are dropped.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let mut document = self.read_document()?;
        let Some(Value::Array(entries)) = document.remove(key) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "dropping unreadable local entry");
                    None
                }
            })
            .collect())
    }

    pub fn save<T: Serialize>(&self, key: &str, values: &[T]) -> Result<()> {
        let mut document = self.read_document()?;
        document.insert(key.to_string(), serde_json::to_value(values)?);
        fs::write(&self.path, serde_json::to_vec_pretty(&document)?)?;
        Ok(())
    }

    pub fn load_cart(&self) -> Result<Cart> {
        Ok(Cart::from_items(self.load::<CartItem>(CART_KEY)?))
    }

    pub fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.save(CART_KEY, cart.items())
    }

    pub fn load_favorites(&self) -> Result<Vec<ProductId>> {
        self.load(FAVORITES_KEY)
    }

    pub fn save_favorites(&self, favorites: &[ProductId]) -> Result<()> {
        self.save(FAVORITES_KEY, favorites)
    }
}
