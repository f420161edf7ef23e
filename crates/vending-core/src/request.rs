use std::io;

use thiserror::Error;
use uuid::Uuid;

use crate::Money;

/// Kind of the request
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum RequestKind {
    /// Retrieve the price of a single item
    Price,

    /// Buy one item against the tendered sum in the JSON payload
    ///
    /// The response carries the change due.
    Buy,

    /// Store the file of a multipart form in the upload directory
    Upload,

    /// Retrieve price, stock, units sold and revenue
    Stats,
}

impl RequestKind {
    /// Route of the request, e.g., `/price`
    pub fn path(&self) -> &'static str {
        match self {
            RequestKind::Price => "/price",
            RequestKind::Buy => "/buy",
            RequestKind::Upload => "/upload",
            RequestKind::Stats => "/admin/stats",
        }
    }

    /// Method the route is registered for
    pub fn method(&self) -> RequestMethod {
        match self {
            RequestKind::Price | RequestKind::Stats => RequestMethod::Get,
            RequestKind::Buy | RequestKind::Upload => RequestMethod::Post,
        }
    }
}

/// Request sent by a customer
pub struct Request {
    kind: RequestKind,
    id: Uuid,
    raw: Box<dyn RawRequest + Send>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("raw", &format_args!(".."))
            .finish()
    }
}

/// HTTP request method
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum RequestMethod {
    /// GET request
    Get,
    /// POST request, may have a payload
    Post,
}

/// Interface for handling requests
pub trait RequestHandler {
    /// Handle a request
    ///
    /// This method may be called concurrently from different threads.
    fn handle(&self, request: Request);

    /// Shut the handler down
    fn shutdown(self);
}

/// Failure to read a request body
#[derive(Debug, Error)]
pub enum BodyError {
    /// The body is longer than the permitted limit
    #[error("request body exceeds {limit} bytes")]
    TooLarge {
        /// Permitted size in bytes
        limit: u64,
    },
    /// The transport failed while reading
    #[error("failed to read request body: {0}")]
    Io(#[from] io::Error),
}

/// A raw request, implemented by the transport
///
/// Every `respond_*` method sends exactly one complete response (status,
/// headers and body) and consumes the request.
pub trait RawRequest {
    /// Get the URL
    fn url(&self) -> &str;
    /// Get the request method
    fn method(&self) -> RequestMethod;
    /// Get the value of the `Content-Type` header, if present
    fn content_type(&self) -> Option<&str>;

    /// Read the request body, stopping after `limit + 1` bytes
    ///
    /// A returned buffer longer than `limit` marks an overlong body; its
    /// contents are truncated.
    fn read_bytes(&mut self, limit: u64) -> io::Result<Vec<u8>>;

    /// Respond with an error status and a (possibly empty) message
    fn respond_with_err(self: Box<Self>, status: u16, err: String, id: Uuid);
    /// Respond with an integer as plain text
    fn respond_with_int(self: Box<Self>, int: Money, id: Uuid);
    /// Respond with an encoded JSON document
    fn respond_with_json(self: Box<Self>, json: Vec<u8>, id: Uuid);
    /// Respond to a successful upload stored as `name` with an empty body
    fn respond_with_stored(self: Box<Self>, name: String, id: Uuid);
}

impl Request {
    /// Get the request's kind
    #[inline]
    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    /// Get the request id
    ///
    /// Echoed from the `X-Request-Id` header or randomly generated.
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the request URL
    #[inline]
    pub fn url(&self) -> &str {
        self.raw.url()
    }

    /// Get the request method
    #[inline]
    pub fn method(&self) -> RequestMethod {
        self.raw.method()
    }

    /// Get the `Content-Type` header
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.raw.content_type()
    }

    /// Read the whole payload, refusing bodies longer than `limit` bytes
    ///
    /// This method has side effects and should be called only once per
    /// request.
    pub fn read_body(&mut self, limit: u64) -> Result<Vec<u8>, BodyError> {
        let body = self.raw.read_bytes(limit)?;
        if body.len() as u64 > limit {
            return Err(BodyError::TooLarge { limit });
        }
        Ok(body)
    }

    /// Respond with an error status and a message for the customer.
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_err(self, status: u16, err: impl Into<String>) {
        self.raw.respond_with_err(status, err.into(), self.id);
    }

    /// Respond with an integer, e.g., the price.
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_int(self, int: Money) {
        self.raw.respond_with_int(int, self.id);
    }

    /// Respond with an already encoded JSON document
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_json(self, json: Vec<u8>) {
        self.raw.respond_with_json(json, self.id);
    }

    /// Acknowledge an upload stored under `name`
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_stored(self, name: impl Into<String>) {
        self.raw.respond_with_stored(name.into(), self.id);
    }

    /// Create a new request from a [`RawRequest`]
    #[inline]
    pub fn from_raw(kind: RequestKind, id: Uuid, raw: Box<dyn RawRequest + Send>) -> Self {
        Self { kind, id, raw }
    }
}
