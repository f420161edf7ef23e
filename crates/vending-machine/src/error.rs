//! Errors terminating a request

use std::io;

use thiserror::Error;

/// Reasons a request could not be served
///
/// Client and business errors carry a message for the customer, server
/// errors are only logged.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("Not enough money for {item}. Please, check the price.")]
    InsufficientFunds { item: String },
    #[error("{} is out of the stock. Sorry.", capitalize(.item))]
    OutOfStock { item: String },
    #[error("missing \"file\" field")]
    MissingFile,
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),
    #[error("upload form exceeds {limit} bytes")]
    FormTooLarge { limit: u64 },
    #[error("unparsable upload form: {0}")]
    Form(#[from] multer::Error),
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("revenue would overflow")]
    RevenueOverflow,
}

impl Error {
    /// HTTP status code the error is answered with
    pub fn status(&self) -> u16 {
        match self {
            Error::InsufficientFunds { .. } => 403,
            Error::Malformed(_)
            | Error::OutOfStock { .. }
            | Error::MissingFile
            | Error::InvalidFileName(_) => 400,
            Error::Config(_)
            | Error::FormTooLarge { .. }
            | Error::Form(_)
            | Error::Io(_)
            | Error::Encode(_)
            | Error::RevenueOverflow => 500,
        }
    }

    /// Whether the failure lies with the server rather than the customer
    pub fn is_internal(&self) -> bool {
        self.status() >= 500
    }

    /// Body sent to the customer
    pub fn customer_message(&self) -> String {
        match self {
            Error::InsufficientFunds { .. } | Error::OutOfStock { .. } => self.to_string(),
            Error::Malformed(_) => String::from("Malformed request."),
            Error::MissingFile => String::from("No file provided."),
            Error::InvalidFileName(_) => String::from("Invalid file name."),
            _ => String::new(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_messages() {
        let funds = Error::InsufficientFunds {
            item: "kumis".into(),
        };
        assert_eq!(funds.status(), 403);
        assert_eq!(
            funds.customer_message(),
            "Not enough money for kumis. Please, check the price."
        );

        let stock = Error::OutOfStock {
            item: "kumis".into(),
        };
        assert_eq!(stock.status(), 400);
        assert_eq!(stock.customer_message(), "Kumis is out of the stock. Sorry.");
    }

    #[test]
    fn internal_errors_have_no_body() {
        let err = Error::Io(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert!(err.is_internal());
        assert!(err.customer_message().is_empty());
        assert_eq!(Error::FormTooLarge { limit: 1 }.status(), 500);
        assert_eq!(Error::RevenueOverflow.status(), 500);
        assert!(Error::RevenueOverflow.customer_message().is_empty());
    }
}
