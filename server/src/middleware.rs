use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, AppState};

/// Authentication gate for the todo routes.
///
/// Puts the caller's [`Identity`](crate::identity::Identity) into the request
/// extensions, or answers with `AppError::Unauthenticated` so the caller is
/// sent to the login page and brought back afterwards.
pub async fn require_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match state.identity.current_identity(req.headers()).await? {
        Some(identity) => {
            tracing::debug!(user_id = %identity.user_id, "authenticated request");
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        None => {
            let return_to = req
                .uri()
                .path_and_query()
                .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());
            tracing::debug!(%return_to, "unauthenticated request");
            Err(AppError::Unauthenticated { next: return_to })
        }
    }
}
