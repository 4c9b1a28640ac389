//! Route handlers.
use axum::Form;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::response::Html;
use tracing::{debug, info};

use super::AppState;
use super::error::ApiError;

/// Name of the form field carrying the user's question.
pub const MSG_FIELD: &str = "msg";

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.chat_page.to_string())
}

/// `GET|POST /get`: answer the `msg` field with plain text.
///
/// POST bodies are url-encoded forms. GET reads the query string only; a
/// form body sent with GET is ignored. When `msg` repeats, the first value wins.
pub async fn chat(
    State(state): State<AppState>,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Result<String, ApiError> {
    let pairs = match form {
        Ok(Form(pairs)) => pairs,
        Err(rejection) => {
            debug!("Rejected chat form: {rejection}");
            return Err(ApiError::MissingField(MSG_FIELD));
        }
    };
    let msg = first_value(pairs, MSG_FIELD).ok_or(ApiError::MissingField(MSG_FIELD))?;

    info!("Query: {msg}");
    let output = state.chain.invoke(&msg).await?;
    info!("Response: {}", output.answer);

    Ok(output.answer)
}

fn first_value(pairs: Vec<(String, String)>, name: &str) -> Option<String> {
    pairs
        .into_iter()
        .find_map(|(key, value)| (key == name).then_some(value))
}
