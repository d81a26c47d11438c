/// Joins an upstream's base URL with the request path and optional query string.
///
/// # Examples
///
/// ```
/// use portcullis_core::utils::path::join_upstream_url;
///
/// let url = join_upstream_url("http://orders-service:8080", "/api/orders/42", None);
/// assert_eq!(url, "http://orders-service:8080/api/orders/42");
///
/// let url = join_upstream_url("http://orders-service:8080/", "/api/orders/42", Some("page=2"));
/// assert_eq!(url, "http://orders-service:8080/api/orders/42?page=2");
/// ```
pub fn join_upstream_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    let base = base_url.trim_end_matches('/');
    let mut url = format!("{}{}", base, path);
    if let Some(q) = query {
        if !q.is_empty() {
            url.push('?');
            url.push_str(q);
        }
    }
    url
}
