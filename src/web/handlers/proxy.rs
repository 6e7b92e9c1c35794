//! Catch-all handler that serves application traffic through the offline worker

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::errors::{AppError, AppResult};
use crate::offline::fetcher::end_to_end;
use crate::offline::{FetchRequest, RequestDestination, ResponseSnapshot, SEC_FETCH_DEST};
use crate::utils::UrlUtils;
use crate::web::{AppState, responses::handle_error};

fn build_request(
    state: &AppState,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> AppResult<FetchRequest> {
    if !uri.path().starts_with('/') {
        return Err(AppError::validation(format!(
            "Invalid request target '{uri}'"
        )));
    }
    // the upstream origin is fixed; only path and query come from the client
    let url = UrlUtils::on_origin(&state.upstream, uri.path(), uri.query());

    let destination = RequestDestination::from_header_value(
        headers.get(SEC_FETCH_DEST).and_then(|v| v.to_str().ok()),
    );

    let mut request = FetchRequest::new(method, url)
        .with_destination(destination)
        .with_headers(headers.clone());
    if !body.is_empty() {
        request = request.with_body(body);
    }
    Ok(request)
}

fn into_response(snapshot: ResponseSnapshot) -> Response {
    let status = StatusCode::from_u16(snapshot.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(snapshot.body));
    *response.status_mut() = status;

    *response.headers_mut() = end_to_end(&snapshot.headers);
    response
}

/// Forward the request to the upstream origin via the worker host
pub async fn proxy_request(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match build_request(&state, method, &uri, &headers, body) {
        Ok(request) => request,
        Err(e) => return handle_error(e).into_response(),
    };

    match state.host.fetch(state.client, request).await {
        Ok(snapshot) => into_response(snapshot),
        Err(e) => handle_error(AppError::Fetch(e)).into_response(),
    }
}
