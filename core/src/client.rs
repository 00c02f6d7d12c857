//! Stateless HTTP request builder and response parser for the todo API.
//!
//! # Design
//! `TodoClient` holds the base URL and, once logged in, the session cookie.
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! The caller executes the round-trip, keeping the core deterministic and
//! free of I/O dependencies.
//!
//! Every todo request asks for JSON explicitly, so the server never falls
//! back to its HTML or redirect encoding.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    CreateTodo, Credentials, ErrorBody, MessageBody, SetState, Todo, TodoList, UpdateTitle,
};

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";
pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
    session: Option<String>,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    /// A client that presents `session` (the `sessionid` cookie value).
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn request(&self, method: HttpMethod, path: &str, body: Option<String>) -> HttpRequest {
        let mut headers = vec![("accept".to_string(), JSON.to_string())];
        if body.is_some() {
            headers.push(("content-type".to_string(), JSON.to_string()));
        }
        if let Some(session) = &self.session {
            headers.push(("cookie".to_string(), format!("{SESSION_COOKIE}={session}")));
        }
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers,
            body,
        }
    }

    fn json_request<T: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        input: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.request(method, path, Some(body)))
    }

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        let body = serde_urlencoded::to_string(credentials)
            .map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/login/", self.base_url),
            headers: vec![("content-type".to_string(), FORM.to_string())],
            body: Some(body),
        })
    }

    pub fn build_list_todos(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/", None)
    }

    pub fn build_get_todo(&self, id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/{id}/"), None)
    }

    pub fn build_create_todo(&self, input: &CreateTodo) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/", input)
    }

    pub fn build_set_state(&self, id: i64, input: &SetState) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, &format!("/{id}/set_state"), input)
    }

    pub fn build_update_title(&self, id: i64, input: &UpdateTitle) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, &format!("/{id}/update_title"), input)
    }

    pub fn build_delete_todo(&self, id: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/{id}/delete"), None)
    }

    /// Extract the session cookie from a successful login.
    ///
    /// A failed login re-renders the form with `200`, so anything other
    /// than a redirect carrying `sessionid` is `LoginFailed`.
    pub fn parse_login(&self, response: HttpResponse) -> Result<String, ApiError> {
        if response.status != 302 {
            return Err(ApiError::LoginFailed);
        }
        response
            .headers_named("set-cookie")
            .filter_map(|c| c.split(';').next())
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
            .map(|(_, value)| value.to_string())
            .ok_or(ApiError::LoginFailed)
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        check_status(&response, 200)?;
        decode::<TodoList>(&response).map(|list| list.todos)
    }

    pub fn parse_get_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, 200)?;
        decode(&response)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, 201)?;
        decode(&response)
    }

    pub fn parse_set_state(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, 200)?;
        decode(&response)
    }

    pub fn parse_update_title(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, 200)?;
        decode(&response)
    }

    /// Returns the server's confirmation message.
    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<String, ApiError> {
        check_status(&response, 200)?;
        decode::<MessageBody>(&response).map(|m| m.message)
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    if let Ok(ErrorBody { error }) = serde_json::from_str(&response.body) {
        return Err(ApiError::Rejected {
            status: response.status,
            message: error,
        });
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TODO_JSON: &str =
        r#"{"id":1,"title":"Test","state":false,"created_at":"2024-05-01T12:00:00Z"}"#;

    fn client() -> TodoClient {
        TodoClient::new("http://localhost:3000").with_session("abc123")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_list_todos_asks_for_json_with_session() {
        let req = client().build_list_todos();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/");
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.header("cookie"), Some("sessionid=abc123"));
        assert_eq!(req.header("content-type"), None);
        assert!(req.body.is_none());
    }

    #[test]
    fn anonymous_client_sends_no_cookie() {
        let anonymous = TodoClient::new("http://localhost:3000");
        assert_eq!(anonymous.session(), None);
        assert_eq!(client().session(), Some("abc123"));
        let req = anonymous.build_get_todo(4);
        assert_eq!(req.path, "http://localhost:3000/4/");
        assert_eq!(req.header("cookie"), None);
    }

    #[test]
    fn build_create_todo_produces_json_post() {
        let input = CreateTodo {
            title: "Buy milk".to_string(),
        };
        let req = client().build_create_todo(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "title": "Buy milk" }));
    }

    #[test]
    fn build_item_routes() {
        let c = client();
        let req = c.build_set_state(3, &SetState { state: true }).unwrap();
        assert_eq!(req.path, "http://localhost:3000/3/set_state");
        assert_eq!(req.body.as_deref(), Some(r#"{"state":true}"#));

        let req = c
            .build_update_title(3, &UpdateTitle { title: "New".into() })
            .unwrap();
        assert_eq!(req.path, "http://localhost:3000/3/update_title");

        let req = c.build_delete_todo(3);
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.path, "http://localhost:3000/3/delete");
    }

    #[test]
    fn build_login_is_a_form_post() {
        let creds = Credentials {
            username: "alice".into(),
            password: "p@ss word".into(),
        };
        let req = TodoClient::new("http://localhost:3000").build_login(&creds).unwrap();
        assert_eq!(req.path, "http://localhost:3000/login/");
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.body.as_deref(), Some("username=alice&password=p%40ss+word"));
    }

    #[test]
    fn parse_login_extracts_session() {
        let resp = HttpResponse {
            status: 302,
            headers: vec![
                ("location".into(), "/".into()),
                ("Set-Cookie".into(), "sessionid=deadbeef; HttpOnly; Path=/".into()),
            ],
            body: String::new(),
        };
        assert_eq!(client().parse_login(resp).unwrap(), "deadbeef");
    }

    #[test]
    fn parse_login_rerendered_form_is_failure() {
        let err = client().parse_login(response(200, "<form>")).unwrap_err();
        assert!(matches!(err, ApiError::LoginFailed));
    }

    #[test]
    fn parse_list_todos_unwraps_envelope() {
        let body = format!(r#"{{"todos":[{TODO_JSON}]}}"#);
        let todos = client().parse_list_todos(response(200, &body)).unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].title, "Test");
        assert_eq!(todos[0].id, 1);
    }

    #[test]
    fn parse_create_todo_success() {
        let todo = client().parse_create_todo(response(201, TODO_JSON)).unwrap();
        assert!(!todo.state);
    }

    #[test]
    fn parse_get_todo_not_found() {
        let err = client().parse_get_todo(response(404, "")).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn parse_update_title_rejection_carries_message() {
        let body = r#"{"error":"title value is required and cannot be empty"}"#;
        let err = client().parse_update_title(response(400, body)).unwrap_err();
        match err {
            ApiError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_delete_todo_returns_message() {
        let body = r#"{"message":"Todo deleted successfully"}"#;
        assert_eq!(client().parse_delete_todo(response(200, body)).unwrap(), "Todo deleted successfully");
    }

    #[test]
    fn unexpected_status_without_payload() {
        let err = client().parse_set_state(response(500, "boom")).unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 500, .. }));
    }

    #[test]
    fn parse_list_todos_bad_json() {
        let err = client().parse_list_todos(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let req = TodoClient::new("http://localhost:3000/").build_list_todos();
        assert_eq!(req.path, "http://localhost:3000/");
    }
}
