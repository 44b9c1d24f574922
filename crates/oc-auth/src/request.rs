use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::{AuthError, Result};

/// Descriptor of one backend call, independent of the HTTP verb
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Set once the request has been replayed after a refresh
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append query parameters; repeated keys are kept as separate pairs
    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Successful (2xx) backend answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            AuthError::InvalidResponse(format!("Unexpected response body: {}", e))
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let request = ApiRequest::get("/api/data/flower")
            .query([("species_ids", "1"), ("species_ids", "2")])
            .query([("page".to_string(), 3.to_string())]);

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.query.len(), 3);
        assert_eq!(request.query[1], ("species_ids".to_string(), "2".to_string()));
        assert!(!request.retried);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_json_body() {
        let request = ApiRequest::put("/api/auth/role/4")
            .json(&serde_json::json!({"role": "admin"}))
            .unwrap();
        assert_eq!(request.body, Some(serde_json::json!({"role": "admin"})));
    }

    #[test]
    fn test_response_decoding() {
        let response = ApiResponse {
            status: StatusCode::OK,
            body: br#"{"species_id": 12}"#.to_vec(),
        };
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["species_id"], 12);

        let broken = ApiResponse {
            status: StatusCode::OK,
            body: b"<html>".to_vec(),
        };
        assert!(matches!(
            broken.json::<serde_json::Value>(),
            Err(AuthError::InvalidResponse(_))
        ));
    }
}
