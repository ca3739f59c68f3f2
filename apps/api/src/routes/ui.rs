use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET /
/// The "Chat with CVs" page: upload sidebar, question box, and chat pane.
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}
