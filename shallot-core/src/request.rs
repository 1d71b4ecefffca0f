// Request and route parameter types

use bytes::Bytes;
use serde::de::DeserializeOwned;
use smallvec::SmallVec;
use std::net::SocketAddr;

/// Inbound request as seen by handlers. The body is fully buffered.
pub type Request = http::Request<Bytes>;

/// Peer of the connection a request arrived on. The transport stores it in
/// the request's extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Client address: `X-Real-IP`, then the first `X-Forwarded-For` entry, then
/// the connection peer.
pub fn remote_addr(request: &Request) -> Option<String> {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(ip) = header("x-real-ip") {
        return Some(ip.to_string());
    }
    if let Some(forwarded) = header("x-forwarded-for")
        && let Some(first) = forwarded.split(',').next()
    {
        return Some(first.trim().to_string());
    }
    request
        .extensions()
        .get::<RemoteAddr>()
        .map(|peer| peer.0.to_string())
}

/// Most routes carry few parameters; keep them inline.
const INLINE_PARAM_COUNT: usize = 4;

/// Named route parameters, in the order the router produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    inner: SmallVec<[(String, String); INLINE_PARAM_COUNT]>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a parameter by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.inner.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.inner.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Parse the buffered body of a request as JSON.
pub fn json_body<T: DeserializeOwned>(request: &Request) -> Result<T, crate::Error> {
    serde_json::from_slice(request.body())
        .map_err(|e| crate::Error::BadRequest(format!("invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_insert_and_get() {
        let mut params = Params::new();
        params.insert("id", "42");
        params.insert("slug", "hello");
        params.insert("id", "43");

        assert_eq!(params.get("id"), Some("43"));
        assert_eq!(params.get("slug"), Some("hello"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_params_keep_order() {
        let params: Params = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        let names: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_json_body() {
        #[derive(serde::Deserialize)]
        struct Payload {
            name: String,
        }

        let request = http::Request::builder()
            .body(Bytes::from_static(br#"{"name":"shallot"}"#))
            .unwrap();
        let payload: Payload = json_body(&request).unwrap();
        assert_eq!(payload.name, "shallot");

        let bad = http::Request::builder()
            .body(Bytes::from_static(b"nope"))
            .unwrap();
        assert!(json_body::<Payload>(&bad).is_err());
    }

    #[test]
    fn test_remote_addr_prefers_proxy_headers() {
        let peer: SocketAddr = "10.0.0.7:52100".parse().unwrap();
        let mut request = http::Request::new(Bytes::new());
        assert_eq!(remote_addr(&request), None);

        request.extensions_mut().insert(RemoteAddr(peer));
        assert_eq!(remote_addr(&request).as_deref(), Some("10.0.0.7:52100"));

        request.headers_mut().insert(
            "x-forwarded-for",
            http::HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(remote_addr(&request).as_deref(), Some("203.0.113.9"));

        request
            .headers_mut()
            .insert("x-real-ip", http::HeaderValue::from_static("198.51.100.4"));
        assert_eq!(remote_addr(&request).as_deref(), Some("198.51.100.4"));
    }
}
