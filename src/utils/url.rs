//! URL helpers for building Ollama endpoint URLs from a user-supplied base.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use aihub::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
/// assert_eq!(normalize_base_url("http://localhost:11434//"), "http://localhost:11434");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path without doubling slashes
///
/// # Examples
///
/// ```
/// use aihub::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434/", "/api/chat"),
///     "http://localhost:11434/api/chat"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}
