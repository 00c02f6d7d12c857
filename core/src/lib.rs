//! Blocking-host client for the todo service's JSON surface.
//!
//! The crate never opens a socket. [`TodoClient`] turns each operation into
//! an [`HttpRequest`] and turns the host's [`HttpResponse`] back into typed
//! values or an [`ApiError`].
//!
//! Sessions are cookie based: log in with `build_login`/`parse_login`, then
//! attach the returned value with [`TodoClient::with_session`]. The wire
//! types here are kept separate from the server crate on purpose so the
//! integration test notices when the two drift apart.

pub mod client;
pub mod error;
pub mod http;
pub mod types;

pub use client::TodoClient;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use types::{CreateTodo, Credentials, SetState, Todo, TodoList, UpdateTitle};
