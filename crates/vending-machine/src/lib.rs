//! The vending machine: ledger, purchases and uploads.
//!
//! The [`Machine`] implements [`RequestHandler`](vending_core::RequestHandler)
//! and is served requests by the surrounding transport, either the HTTP
//! server or the in-process test harness.

use vending_core::Config;

pub mod error;
mod ledger;
mod machine;
pub mod purchase;
pub mod upload;

pub use error::Error;
pub use ledger::Stats;
pub use machine::Machine;
use upload::UploadStore;

/// Entrypoint of the machine
///
/// Validates `config` and prepares the upload directory.
pub fn launch(config: &Config) -> Result<Machine, Error> {
    config.validate().map_err(Error::Config)?;
    let uploads = UploadStore::open(&config.upload_dir)?;
    tracing::info!(
        item = %config.item,
        price = config.price,
        stock = config.stock,
        upload_dir = %uploads.dir().display(),
        "machine launched"
    );
    Ok(Machine::new(config, uploads))
}
