//! Generic header lookup capability and the audited-reader decorator that
//! wraps it.

use std::cell::RefCell;
use std::collections::HashMap;

/// A source of inbound headers. Header names are looked up
/// case-insensitively.
pub trait HeaderSource {
    fn lookup(&self, name: &str) -> Option<&str>;
}

/// A sink for outbound headers.
pub trait HeaderSink {
    fn set(&mut self, name: &str, value: String);
}

impl HeaderSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl HeaderSink for HashMap<String, String> {
    fn set(&mut self, name: &str, value: String) {
        self.insert(name.to_string(), value);
    }
}

impl HeaderSource for http::HeaderMap {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

impl HeaderSink for http::HeaderMap {
    fn set(&mut self, name: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(&value),
        ) {
            self.insert(name, value);
        }
    }
}

/// Decorator around a [`HeaderSource`] that records every successful lookup
/// as a `(name, value)` pair, forming the `headers_examined` audit log
/// attached to each `ExtractedContext`.
pub struct AuditedReader<'a> {
    inner: &'a dyn HeaderSource,
    audit: RefCell<Vec<(String, String)>>,
}

impl<'a> AuditedReader<'a> {
    pub fn new(inner: &'a dyn HeaderSource) -> Self {
        AuditedReader {
            inner,
            audit: RefCell::new(Vec::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let value = self.inner.lookup(name);
        if let Some(value) = value {
            self.audit.borrow_mut().push((name.to_string(), value.to_string()));
        }
        value
    }

    pub fn into_audit_log(self) -> Vec<(String, String)> {
        self.audit.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_lookup() {
        let mut map = HashMap::new();
        map.insert("X-Datadog-Trace-Id".to_string(), "123".to_string());
        assert_eq!(map.lookup("x-datadog-trace-id"), Some("123"));
    }

    #[test]
    fn audited_reader_records_only_hits() {
        let mut map = HashMap::new();
        map.insert("x-datadog-trace-id".to_string(), "123".to_string());
        let reader = AuditedReader::new(&map);
        reader.get("x-datadog-trace-id");
        reader.get("x-datadog-parent-id");
        let log = reader.into_audit_log();
        assert_eq!(log, vec![("x-datadog-trace-id".to_string(), "123".to_string())]);
    }
}
