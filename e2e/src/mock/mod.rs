pub mod client;
pub mod upstream;

use std::collections::VecDeque;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method};
use pushgate_lib::router::{RouteEntry, RouteMap, Target};
use pushgate_lib::RequestData;
use url::Url;

/// Route map returning the same entry for every lookup, or nothing at all.
pub struct StaticRouteMap {
    entry: Option<RouteEntry>,
}

impl StaticRouteMap {
    pub fn new(entry: RouteEntry) -> Self {
        Self { entry: Some(entry) }
    }

    pub fn none() -> Self {
        Self { entry: None }
    }
}

impl RouteMap for StaticRouteMap {
    fn entry(&self, _host: &str, _encoded_path: &str, _is_https: bool) -> Option<RouteEntry> {
        self.entry.clone()
    }
}

/// Route entry with the given targets and no signing material.
pub fn route_to(targets: &[(&str, u16)]) -> RouteEntry {
    RouteEntry {
        prefix: "test-".to_string(),
        targets: targets
            .iter()
            .map(|(host, port)| Target::new(*host, *port))
            .collect::<VecDeque<_>>(),
        sig_iss: String::new(),
        sig_key: String::new(),
    }
}

/// GET request for the given absolute URI with no body.
pub fn get_request(uri: &str) -> RequestData {
    RequestData {
        method: Method::GET,
        uri: Url::parse(uri).expect("could not parse request uri"),
        headers: HeaderMap::new(),
        body: Bytes::new(),
    }
}

/// POST request carrying the given body.
pub fn post_request(uri: &str, body: &[u8]) -> RequestData {
    RequestData {
        method: Method::POST,
        uri: Url::parse(uri).expect("could not parse request uri"),
        headers: HeaderMap::new(),
        body: Bytes::copy_from_slice(body),
    }
}

/// Response header map with a `Content-Type` line.
pub fn content_type_headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_str(value).expect("could not build content-type"),
    );
    headers
}
