//! 🏗 HTTP request implementation

use std::io::{self, Read};

use tiny_http::{Header, Method, Response};
use tracing::{debug, warn};
use uuid::Uuid;
use vending_core::{Money, RequestKind};

/// All routes served by the machine
const ROUTES: [RequestKind; 4] = [
    RequestKind::Price,
    RequestKind::Buy,
    RequestKind::Upload,
    RequestKind::Stats,
];

/// A routed request, served with the method of its [`RequestKind`]
struct HTTPRequest {
    rq: tiny_http::Request,
    kind: RequestKind,
}

impl vending_core::RawRequest for HTTPRequest {
    fn url(&self) -> &str {
        self.rq.url()
    }

    fn method(&self) -> vending_core::RequestMethod {
        self.kind.method()
    }

    fn content_type(&self) -> Option<&str> {
        self.rq
            .headers()
            .iter()
            .find(|hdr| hdr.field.equiv("content-type"))
            .map(|hdr| hdr.value.as_str())
    }

    fn read_bytes(&mut self, limit: u64) -> io::Result<Vec<u8>> {
        let capacity = self
            .rq
            .body_length()
            .unwrap_or(0)
            .min((limit as usize).saturating_add(1));
        let mut buf = Vec::with_capacity(capacity);
        Read::take(self.rq.as_reader(), limit.saturating_add(1)).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn respond_with_err(self: Box<Self>, status: u16, err: String, id: Uuid) {
        let mut res = Response::from_string(err).with_status_code(status);
        add_header(&mut res, "Content-Type", "text/plain; charset=utf-8");
        respond(self.rq, res, id)
    }

    fn respond_with_int(self: Box<Self>, int: Money, id: Uuid) {
        let mut res = Response::from_string(int.to_string()).with_status_code(200);
        add_header(&mut res, "Content-Type", "text/plain; charset=utf-8");
        respond(self.rq, res, id)
    }

    fn respond_with_json(self: Box<Self>, json: Vec<u8>, id: Uuid) {
        let mut res = Response::from_data(json).with_status_code(200);
        add_header(&mut res, "Content-Type", "application/json");
        respond(self.rq, res, id)
    }

    fn respond_with_stored(self: Box<Self>, name: String, id: Uuid) {
        let mut res = Response::empty(200);
        add_header(&mut res, "X-Upload-Name", &name);
        respond(self.rq, res, id)
    }
}

/// Add HTTP headers (CORS, X-Request-Id) to `res` and send it
fn respond<R: Read>(rq: tiny_http::Request, mut res: Response<R>, id: Uuid) {
    add_response_cors_headers(&mut res);
    add_header(&mut res, "X-Request-Id", &id.hyphenated().to_string());

    if let Err(err) = rq.respond(res) {
        warn!(%id, "HTTP response failed: {err}");
    }
}

/// Outcome of matching a request line against the routes
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Route {
    /// A route served by the machine
    Kind(RequestKind),
    /// CORS preflight request
    Preflight,
    /// The path is not served at all
    NotFound,
    /// The path exists, but not for this method
    MethodNotAllowed,
}

/// Match `method` and `url` against the routes
///
/// Query strings are ignored.
pub fn route(method: &Method, url: &str) -> Route {
    let path = url.split('?').next().unwrap_or_default();
    let method = match method {
        Method::Options => return Route::Preflight,
        Method::Get => vending_core::RequestMethod::Get,
        Method::Post => vending_core::RequestMethod::Post,
        _ => return Route::MethodNotAllowed,
    };

    let mut path_known = false;
    for kind in ROUTES {
        if kind.path() == path {
            if kind.method() == method {
                return Route::Kind(kind);
            }
            path_known = true;
        }
    }
    if path_known {
        Route::MethodNotAllowed
    } else {
        Route::NotFound
    }
}

/// Text listing the valid requests, sent with every 404
fn route_listing() -> String {
    let mut s =
        String::from("🦀 could not find the service you are looking for!\n\nValid requests are:\n");
    for kind in ROUTES {
        let method = match kind.method() {
            vending_core::RequestMethod::Get => "GET ",
            vending_core::RequestMethod::Post => "POST",
        };
        s.push_str(&format!("  {method} {}\n", kind.path()));
    }
    s
}

/// Parse the given HTTP request
///
/// If [`None`] is returned, the request was already answered with a
/// corresponding error message.
pub fn parse(rq: tiny_http::Request) -> Option<vending_core::Request> {
    let id = rq
        .headers()
        .iter()
        .find(|hdr| hdr.field.equiv("x-request-id"))
        .and_then(|hdr| Uuid::parse_str(hdr.value.as_str()).ok())
        .unwrap_or_else(Uuid::new_v4);

    let matched = route(rq.method(), rq.url());
    debug!(%id, method = %rq.method(), url = rq.url(), route = ?matched, "received request");

    let kind = match matched {
        Route::Kind(kind) => kind,
        Route::Preflight => {
            respond(rq, Response::empty(204), id);
            return None;
        }
        Route::NotFound => {
            let res = Response::from_string(route_listing()).with_status_code(404);
            respond(rq, res, id);
            return None;
        }
        Route::MethodNotAllowed => {
            respond(rq, Response::empty(405), id);
            return None;
        }
    };

    Some(vending_core::Request::from_raw(
        kind,
        id,
        Box::new(HTTPRequest { rq, kind }),
    ))
}

fn add_header<R: Read>(res: &mut Response<R>, field: &str, value: &str) {
    match Header::from_bytes(field.as_bytes(), value.as_bytes()) {
        Ok(header) => res.add_header(header),
        Err(()) => warn!(field, "dropping header with a non-ASCII value"),
    }
}

/// Add CORS headers to `res`
fn add_response_cors_headers<R: Read>(res: &mut Response<R>) {
    add_header(res, "Access-Control-Request-Method", "*");
    add_header(res, "Access-Control-Allow-Origin", "*");
    add_header(res, "Access-Control-Allow-Headers", "*");
    add_header(res, "Access-Control-Expose-Headers", "*");
}
