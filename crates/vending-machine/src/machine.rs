//! Implementation of the request handler selling items
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use vending_core::{BodyError, Config, Money, Request, RequestHandler, RequestKind};

use crate::error::Error;
use crate::ledger::{Ledger, Stats};
use crate::purchase::{PurchaseRequest, PurchaseResponse, MAX_PURCHASE_BODY};
use crate::upload::{self, UploadStore};

/// The vending machine
///
/// All request threads share one machine. The ledger is the only mutable
/// state and sits behind a single lock.
pub struct Machine {
    item: String,
    price: Money,
    max_upload_size: u64,
    ledger: Mutex<Ledger>,
    uploads: UploadStore,
}

impl Machine {
    /// Create a new [`Machine`]
    pub fn new(config: &Config, uploads: UploadStore) -> Self {
        Self {
            item: config.item.clone(),
            price: config.price,
            max_upload_size: config.max_upload_size,
            ledger: Mutex::new(Ledger::new(config.stock)),
            uploads,
        }
    }

    /// Get the price of a single item
    pub fn price(&self) -> Money {
        self.price
    }

    /// Get a snapshot of stock and revenue
    pub fn stats(&self) -> Stats {
        self.ledger.lock().stats(self.price)
    }

    /// Get the upload store
    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    /// Sell one item against `sum`, returning the change.
    pub fn buy(&self, sum: Money) -> Result<Money, Error> {
        if sum < self.price {
            return Err(Error::InsufficientFunds {
                item: self.item.clone(),
            });
        }
        if !self.ledger.lock().sell(self.price)? {
            return Err(Error::OutOfStock {
                item: self.item.clone(),
            });
        }
        Ok(sum - self.price)
    }

    fn handle_buy(&self, rq: &mut Request) -> Result<Vec<u8>, Error> {
        let body = rq.read_body(MAX_PURCHASE_BODY).map_err(|e| match e {
            BodyError::TooLarge { limit } => {
                Error::Malformed(format!("payload exceeds {limit} bytes"))
            }
            BodyError::Io(e) => Error::Io(e),
        })?;
        let PurchaseRequest { sum } = PurchaseRequest::decode(&body)?;
        let change = self.buy(sum)?;
        info!(id = %rq.id(), sum, change, "sold one {}", self.item);
        Ok(serde_json::to_vec(&PurchaseResponse { change })?)
    }

    fn handle_upload(&self, rq: &mut Request) -> Result<String, Error> {
        let limit = self.max_upload_size;
        let body = rq.read_body(limit).map_err(|e| match e {
            BodyError::TooLarge { limit } => Error::FormTooLarge { limit },
            BodyError::Io(e) => Error::Io(e),
        })?;
        let file = upload::parse_form(rq.content_type(), body, limit)?;
        let name = self.uploads.store(&file.file_name, &file.data)?;
        info!(id = %rq.id(), file = %name, bytes = file.data.len(), "stored upload");
        Ok(name)
    }
}

/// Answer `rq` with `err`, logging it at a level matching its origin
fn respond_with_error(rq: Request, err: Error) {
    if err.is_internal() {
        error!(id = %rq.id(), kind = ?rq.kind(), "{err}");
    } else {
        warn!(id = %rq.id(), kind = ?rq.kind(), "{err}");
    }
    rq.respond_with_err(err.status(), err.customer_message());
}

impl RequestHandler for Machine {
    fn handle(&self, mut rq: Request) {
        debug!(
            id = %rq.id(),
            kind = ?rq.kind(),
            method = ?rq.method(),
            url = rq.url(),
            "handling request"
        );
        match rq.kind() {
            RequestKind::Price => rq.respond_with_int(self.price),
            RequestKind::Buy => match self.handle_buy(&mut rq) {
                Ok(json) => rq.respond_with_json(json),
                Err(err) => respond_with_error(rq, err),
            },
            RequestKind::Upload => match self.handle_upload(&mut rq) {
                Ok(name) => rq.respond_with_stored(name),
                Err(err) => respond_with_error(rq, err),
            },
            RequestKind::Stats => match serde_json::to_vec(&self.stats()) {
                Ok(json) => rq.respond_with_json(json),
                Err(err) => respond_with_error(rq, err.into()),
            },
        }
    }

    fn shutdown(self) {
        let stats = self.stats();
        info!(
            stock = stats.stock,
            sold = stats.sold,
            revenue = stats.revenue,
            "machine shut down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(stock: u32) -> Machine {
        machine_with(Config {
            stock,
            ..Config::default()
        })
    }

    fn machine_with(config: Config) -> Machine {
        let dir = std::env::temp_dir().join(format!("vending-machine-{}", uuid::Uuid::new_v4()));
        Machine::new(&config, UploadStore::open(dir).unwrap())
    }

    #[test]
    fn buy_returns_change() {
        let machine = machine(10_000);
        assert_eq!(machine.buy(150).unwrap(), 50);
        let stats = machine.stats();
        assert_eq!(stats.stock, 9_999);
        assert_eq!(stats.revenue, 100);
        std::fs::remove_dir_all(machine.uploads().dir()).unwrap();
    }

    #[test]
    fn insufficient_funds_are_checked_before_stock() {
        let machine = machine(0);
        assert!(matches!(
            machine.buy(50),
            Err(Error::InsufficientFunds { .. })
        ));
        assert!(matches!(machine.buy(200), Err(Error::OutOfStock { .. })));
        assert_eq!(machine.stats().revenue, 0);
        std::fs::remove_dir_all(machine.uploads().dir()).unwrap();
    }

    #[test]
    fn exact_sum_gives_no_change() {
        let machine = machine(1);
        assert_eq!(machine.buy(machine.price()).unwrap(), 0);
        assert!(machine.buy(machine.price()).is_err());
        std::fs::remove_dir_all(machine.uploads().dir()).unwrap();
    }

    #[test]
    fn overflowing_revenue_fails_without_selling() {
        let machine = machine_with(Config {
            price: Money::MAX,
            stock: 2,
            ..Config::default()
        });
        assert_eq!(machine.buy(Money::MAX).unwrap(), 0);
        assert!(matches!(
            machine.buy(Money::MAX),
            Err(Error::RevenueOverflow)
        ));
        let stats = machine.stats();
        assert_eq!(stats.stock, 1);
        assert_eq!(stats.sold, 1);
        assert_eq!(stats.revenue, Money::MAX);
        std::fs::remove_dir_all(machine.uploads().dir()).unwrap();
    }
}
