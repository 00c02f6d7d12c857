//! Content negotiation and request-body decoding shared by the todo routes.
//!
//! A request is answered with JSON when its `Accept` header is exactly
//! `application/json` **or** its own body is declared as
//! `application/json`. The second half lets clients that post JSON get JSON
//! back without sending `Accept`. Everything else gets the default encoding:
//! redirects after mutations and short text or HTML on reads.

use std::collections::HashMap;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::model::FieldValue;

pub const JSON_MIME: &str = "application/json";
pub const FORM_MIME: &str = "application/x-www-form-urlencoded";

/// Media type of the body without parameters such as `charset`.
fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim())
}

pub fn body_is_json(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| ct.eq_ignore_ascii_case(JSON_MIME))
}

pub fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == JSON_MIME)
}

/// Whether the response should use the structured encoding.
pub fn wants_json(headers: &HeaderMap) -> bool {
    accepts_json(headers) || body_is_json(headers)
}

/// Named fields decoded from a JSON object or a urlencoded form.
#[derive(Debug, Default)]
pub struct Payload {
    fields: HashMap<String, FieldValue>,
}

impl Payload {
    /// Decode `body` according to the request's content type.
    ///
    /// Bodies of any other type decode to an empty payload. A JSON value
    /// that is not an object carries no fields.
    ///
    /// # Errors
    /// `MalformedInput` when a JSON body does not parse.
    pub fn parse(headers: &HeaderMap, body: &[u8]) -> Result<Self, AppError> {
        if body_is_json(headers) {
            let value: serde_json::Value =
                serde_json::from_slice(body).map_err(|_| AppError::MalformedInput)?;
            let fields = match value {
                serde_json::Value::Object(map) => map
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::Json(v)))
                    .collect(),
                _ => HashMap::new(),
            };
            return Ok(Self { fields });
        }

        if content_type(headers).is_some_and(|ct| ct.eq_ignore_ascii_case(FORM_MIME)) {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
                .map_err(|_| AppError::Validation("Invalid form data"))?;
            let fields = pairs
                .into_iter()
                .map(|(k, v)| (k, FieldValue::Text(v)))
                .collect();
            return Ok(Self { fields });
        }

        Ok(Self::default())
    }

    /// A field, with JSON `null` treated as absent.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// A field's text, trimmed. Non-string JSON values count as absent.
    pub fn trimmed(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str).map(str::trim)
    }

    /// A form field's raw text.
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(FieldValue::as_str).map(str::to_owned)
    }
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn accept_json_selects_json() {
        assert!(wants_json(&headers(&[(header::ACCEPT, "application/json")])));
    }

    #[test]
    fn json_body_selects_json_without_accept() {
        assert!(wants_json(&headers(&[(header::CONTENT_TYPE, "application/json; charset=utf-8")])));
    }

    #[test]
    fn browser_accept_does_not_select_json() {
        let h = headers(&[(header::ACCEPT, "text/html,application/json;q=0.9")]);
        assert!(!wants_json(&h));
        assert!(!wants_json(&HeaderMap::new()));
    }

    #[test]
    fn parses_json_object_fields() {
        let h = headers(&[(header::CONTENT_TYPE, JSON_MIME)]);
        let p = Payload::parse(&h, br#"{"title":"  Milk  ","state":true,"gone":null}"#).unwrap();
        assert_eq!(p.trimmed("title"), Some("Milk"));
        assert_eq!(p.get("state"), Some(&FieldValue::Json(serde_json::json!(true))));
        assert!(p.get("gone").is_none());
        assert!(p.get("missing").is_none());
    }

    #[test]
    fn invalid_json_is_malformed() {
        let h = headers(&[(header::CONTENT_TYPE, JSON_MIME)]);
        assert!(matches!(Payload::parse(&h, b"invalid json"), Err(AppError::MalformedInput)));
    }

    #[test]
    fn non_object_json_has_no_fields() {
        let h = headers(&[(header::CONTENT_TYPE, JSON_MIME)]);
        let p = Payload::parse(&h, b"[1,2,3]").unwrap();
        assert!(p.get("title").is_none());
    }

    #[test]
    fn parses_form_fields_as_text() {
        let h = headers(&[(header::CONTENT_TYPE, FORM_MIME)]);
        let p = Payload::parse(&h, b"title=Buy+milk&state=on").unwrap();
        assert_eq!(p.text("title").as_deref(), Some("Buy milk"));
        assert_eq!(p.get("state"), Some(&FieldValue::Text("on".into())));
    }

    #[test]
    fn non_string_title_is_absent() {
        let h = headers(&[(header::CONTENT_TYPE, JSON_MIME)]);
        let p = Payload::parse(&h, br#"{"title":42}"#).unwrap();
        assert_eq!(p.trimmed("title"), None);
    }

    #[test]
    fn found_is_302() {
        let resp = found("/");
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "/");
    }
}
