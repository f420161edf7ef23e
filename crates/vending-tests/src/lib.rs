use std::path::PathBuf;

use eyre::Result;
use uuid::Uuid;
use vending_core::Money;

mod api;
pub use api::{Api, ApiError, ApiResponse, MultipartForm};

pub struct TestCtxBuilder {
    /// Name of the sold item
    pub item: String,
    /// Price of a single item
    pub price: Money,
    /// Initial stock
    pub stock: u32,
    /// Upper bound for upload forms in bytes
    pub max_upload_size: u64,
    /// Count of worker threads
    pub workers: u16,
}

impl Default for TestCtxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCtxBuilder {
    /// Create a new test context builder initialized with the machine's defaults
    pub fn new() -> Self {
        let config = vending_core::Config::default();
        TestCtxBuilder {
            item: config.item,
            price: config.price,
            stock: config.stock,
            max_upload_size: config.max_upload_size,
            workers: 2,
        }
    }

    /// Set the price of a single item
    pub fn with_price(mut self, price: Money) -> Self {
        self.price = price;
        self
    }

    /// Set the number of initially available items
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    /// Set the upper bound for upload forms
    pub fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = bytes;
        self
    }

    /// Set the number of worker threads to use
    pub fn with_workers(mut self, workers: u16) -> Self {
        assert_ne!(workers, 0);
        self.workers = workers;
        self
    }

    /// Get the [`vending_core::Config`] for launching the machine
    fn config(&self, upload_dir: PathBuf) -> vending_core::Config {
        vending_core::Config {
            item: self.item.clone(),
            price: self.price,
            stock: self.stock,
            max_upload_size: self.max_upload_size,
            upload_dir,
        }
    }

    /// Build the test context
    ///
    /// Every context gets a fresh upload directory below the system's
    /// temporary directory.
    pub async fn build(self) -> Result<TestCtx> {
        let upload_dir = std::env::temp_dir().join(format!("vending-tests-{}", Uuid::new_v4()));
        let config = self.config(upload_dir.clone());
        let (machine, api) = api::mock::start(self.workers, config).await?;

        Ok(TestCtx {
            api,
            machine,
            price: self.price,
            stock: self.stock,
            upload_dir,
            drop_bomb: DropBomb,
        })
    }
}

/// Test context
pub struct TestCtx {
    /// API allowing to interact with the machine
    pub api: Api,
    machine: api::mock::MockMachine,
    /// Price of a single item
    pub price: Money,
    /// Initial stock
    pub stock: u32,
    /// Directory uploads are stored in
    pub upload_dir: PathBuf,

    drop_bomb: DropBomb,
}

impl TestCtx {
    /// Shut the machine down, remove the upload directory and finish the test
    pub async fn finish(self) -> Result<()> {
        std::mem::forget(self.drop_bomb);
        drop(self.api);
        self.machine.shutdown().await?;
        if self.upload_dir.exists() {
            std::fs::remove_dir_all(&self.upload_dir)?;
        }
        Ok(())
    }
}

struct DropBomb;

impl Drop for DropBomb {
    fn drop(&mut self) {
        eprintln!("@TestAuthor: You should call `ctx.finish().await` to shut the machine down");
    }
}
