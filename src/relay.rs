use crate::config::RelayConfig;
use crate::error::{HandlerError, RelayError};
use crate::translate::gemini_types::GenerateContentRequest;
use crate::translate::response::RelayReply;

use tracing::{debug, info, warn};

/// Send one `generateContent` call and shape the result.
///
/// Non-success statuses come back as [`HandlerError::Upstream`] with the body
/// untouched. Transport failures and unparseable success bodies are
/// [`HandlerError::Unexpected`]. Nothing is retried.
pub async fn generate_content(
    req: &GenerateContentRequest,
    model: &str,
    api_key: &str,
    config: &RelayConfig,
    client: &reqwest::Client,
) -> Result<RelayReply, HandlerError> {
    let url = config.generate_url(model);

    info!(%url, model, contents = req.contents.len(), "POST generateContent");

    let response = client
        .post(&url)
        .query(&[("key", api_key)])
        .json(req)
        .send()
        .await
        .map_err(without_url)?;

    let status = response.status();
    let body = response.bytes().await.map_err(without_url)?;

    debug!(status = status.as_u16(), body_len = body.len(), "Upstream response");

    if !status.is_success() {
        let preview = truncate(&String::from_utf8_lossy(&body), 300).to_string();
        warn!(
            status = status.as_u16(),
            body = %preview,
            "Upstream returned an error"
        );
        return Err(HandlerError::Upstream { status, body });
    }

    let raw: serde_json::Value = serde_json::from_slice(&body)?;
    Ok(RelayReply::from_upstream(raw))
}

/// reqwest errors carry the request URL, which includes the key.
fn without_url(err: reqwest::Error) -> RelayError {
    RelayError::Http(err.without_url())
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
