//! wiremock helpers for SSE sources and forward targets.

use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

/// Serves `body` as a one-shot SSE response on `GET route`.
///
/// Later requests fall through to wiremock's 404, which a receiver treats
/// as a failed connect.
pub async fn mount_sse_source(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// Accepts every `POST route` with `status`.
pub async fn mount_forward_target(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// POST requests the server has received, in arrival order.
pub async fn post_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.as_str() == "POST")
        .collect()
}
