/// Errors from the HTTP client layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The response parsed but did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// No API key configured for a service that requires one.
    #[error("No API key configured (set LLM_API_KEY or GROQ_API_KEY)")]
    MissingApiKey,
}

/// Ensure the response has a success status code, returning it unchanged.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ClientError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
