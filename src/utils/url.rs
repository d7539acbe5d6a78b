//! Endpoint URL construction for the chat completions backend.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use relais::utils::url::normalize_base_url;
///
/// assert_eq!(
///     normalize_base_url("https://generativelanguage.googleapis.com/v1beta/openai/"),
///     "https://generativelanguage.googleapis.com/v1beta/openai"
/// );
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash between them
///
/// # Examples
///
/// ```
/// use relais::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434/v1/", "/chat/completions"),
///     "http://localhost:11434/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}
