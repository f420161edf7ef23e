//! 🏗 Infrastructure for handling requests, etc.
#![warn(missing_docs)]

use std::path::PathBuf;

use serde::Deserialize;

mod request;

pub use request::{
    BodyError, RawRequest, Request, RequestHandler, RequestKind, RequestMethod,
};

/// Unit of money for prices, tendered sums and change
pub type Money = i64;

/// Configuration of the vending machine
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Name of the sold item, used in customer-facing messages
    pub item: String,
    /// Price of a single item
    pub price: Money,
    /// Amount of initially available items
    pub stock: u32,
    /// Upper bound in bytes for an upload form
    pub max_upload_size: u64,
    /// Directory uploaded files are confined to
    pub upload_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            item: String::from("kumis"),
            price: 100,
            stock: 10_000,
            max_upload_size: 20 << 20,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl Config {
    /// Check the values that cannot be expressed by the field types alone
    pub fn validate(&self) -> Result<(), String> {
        if self.item.trim().is_empty() {
            return Err("item name must not be empty".into());
        }
        if self.price < 0 {
            return Err(format!("price must not be negative, got {}", self.price));
        }
        if self.price.checked_mul(Money::from(self.stock)).is_none() {
            return Err(format!(
                "selling {} items at {} would overflow the revenue",
                self.stock, self.price
            ));
        }
        if self.max_upload_size == 0 {
            return Err("max upload size must be positive".into());
        }
        if self.upload_dir.as_os_str().is_empty() {
            return Err("upload directory must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.price, 100);
        assert_eq!(config.stock, 10_000);
        assert_eq!(config.max_upload_size, 20 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_negative_price() {
        let config = Config {
            price: -1,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_overflowing_revenue() {
        let config = Config {
            price: Money::MAX,
            stock: 2,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            price: Money::MAX,
            stock: 1,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_blank_item() {
        let config = Config {
            item: "  ".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
