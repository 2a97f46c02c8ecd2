//! Application-side request and response types

use keycase::{Form, Value};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Request body in application (camelCase) form.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Form),
}

/// Per-request metadata carried through the pipeline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// `req_<uuid>` for log correlation
    pub request_id: String,
    /// Set once the request has been replayed after a renewal. A retried
    /// request that fails auth again is not retried a second time.
    pub retried: bool,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: format!("req_{}", uuid::Uuid::new_v4().simple()),
            retried: false,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Query map; keys are rewritten to snake_case and values flattened.
    pub query: Option<Value>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub context: RequestContext,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            context: RequestContext::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: impl Into<Value>) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    pub fn put(path: impl Into<String>, body: impl Into<Value>) -> Self {
        Self::new(Method::PUT, path).json(body)
    }

    pub fn patch(path: impl Into<String>, body: impl Into<Value>) -> Self {
        Self::new(Method::PATCH, path).json(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: impl Into<Value>) -> Self {
        self.body = RequestBody::Json(body.into());
        self
    }

    pub fn form(mut self, form: Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn query(mut self, query: impl Into<Value>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A successful response with its body in camelCase.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Flatten a wire-case query map into ordered pairs.
///
/// Scalars become their string form, arrays repeat the key, nulls are
/// dropped, nested objects are sent as JSON text. Anything other than an
/// object yields no pairs.
pub(crate) fn flatten_query(query: Value) -> Vec<(String, String)> {
    let Value::Object(map) = query else {
        return Vec::new();
    };
    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = query_text(item) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = query_text(other) {
                    pairs.push((key, text));
                }
            }
        }
    }
    pairs
}

fn query_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => match other.into_json() {
            serde_json::Value::String(s) => Some(s),
            json => Some(json.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_ids_are_unique_and_prefixed() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert!(a.request_id.starts_with("req_"));
        assert_ne!(a.request_id, b.request_id);
        assert!(!a.retried);
    }

    #[test]
    fn builders_set_method_and_body() {
        let request = ApiRequest::post("/events/", Value::from(json!({"title": "Standup"})))
            .query(Value::from(json!({"dryRun": true})));
        assert_eq!(request.method, Method::POST);
        assert!(matches!(request.body, RequestBody::Json(_)));
        assert!(request.query.is_some());

        let request = ApiRequest::delete("/events/3/");
        assert_eq!(request.method, Method::DELETE);
        assert!(matches!(request.body, RequestBody::Empty));
    }

    #[test]
    fn query_flattening_rules() {
        let query = Value::from(json!({
            "page_size": 20,
            "tag_ids": [1, 2, null],
            "since": null,
            "archived": false,
            "search": "ann lee",
            "filter": {"room": "A"}
        }));
        let pairs = flatten_query(query);
        assert_eq!(
            pairs,
            vec![
                ("archived".to_string(), "false".to_string()),
                ("filter".to_string(), r#"{"room":"A"}"#.to_string()),
                ("page_size".to_string(), "20".to_string()),
                ("search".to_string(), "ann lee".to_string()),
                ("tag_ids".to_string(), "1".to_string()),
                ("tag_ids".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn non_object_query_yields_nothing() {
        assert!(flatten_query(Value::Null).is_empty());
        assert!(flatten_query(Value::from("x=1")).is_empty());
    }
}
