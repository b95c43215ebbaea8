//! Public URL construction for upload responses.

use axum::http::{header, HeaderMap, Uri};
use snapbin_core::SnapConfig;
use url::{form_urlencoded, Url};

/// First value of a query parameter, percent-decoded.
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// The absolute URL the client used. Relative request targets are resolved
/// against the `Host` header and the configured public scheme.
pub fn request_url(uri: &Uri, headers: &HeaderMap, config: &SnapConfig) -> Option<Url> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string()).ok();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| config.http_addr());
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    Url::parse(&format!("{}://{}{}", config.public_scheme, host, path_and_query)).ok()
}

fn query_pairs(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn write_query(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

/// Replace the first `name` in place (dropping later duplicates) or append it.
fn set_param(pairs: &mut Vec<(String, String)>, name: &str, value: &str) {
    match pairs.iter().position(|(k, _)| k == name) {
        Some(first) => {
            pairs[first].1 = value.to_string();
            let mut index = 0;
            pairs.retain(|(k, _)| {
                let keep = index <= first || k != name;
                index += 1;
                keep
            });
        }
        None => pairs.push((name.to_string(), value.to_string())),
    }
}

/// Where the uploaded blob can be fetched: `/file/{key}` on the request's
/// origin, or `https://{domain}/{key}` with a custom public bucket domain.
pub fn image_url(request: &Url, key: &str, config: &SnapConfig) -> String {
    let mut url = request.clone();
    let pairs: Vec<_> = query_pairs(&url)
        .into_iter()
        .filter(|(k, _)| k != "filename" && k != "authkey")
        .collect();
    write_query(&mut url, &pairs);
    url.set_fragment(None);

    if let Some(domain) = &config.custom_public_bucket_domain {
        if let Ok(mut public) = Url::parse(&format!("{}://{}/", url.scheme(), domain)) {
            public.set_path(key);
            public.set_query(url.query());
            return public.to_string();
        }
    }

    url.set_path(&format!("/file/{}", key));
    url.to_string()
}

/// Pre-authorized deletion link: `/delete` with `authkey` and `filename` set.
pub fn delete_url(request: &Url, key: &str, config: &SnapConfig) -> String {
    let mut url = request.clone();
    url.set_path("/delete");
    url.set_fragment(None);
    let mut pairs = query_pairs(&url);
    set_param(&mut pairs, "authkey", &config.auth_key);
    set_param(&mut pairs, "filename", key);
    write_query(&mut url, &pairs);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_request() -> Url {
        Url::parse("https://i.example.com/upload?filename=test-upload").unwrap()
    }

    #[test]
    fn image_url_points_at_file_route() {
        let config = SnapConfig::new("test");
        assert_eq!(
            image_url(&upload_request(), "2024/01/test-upload", &config),
            "https://i.example.com/file/2024/01/test-upload"
        );
    }

    #[test]
    fn image_url_uses_custom_domain() {
        let config = SnapConfig::new("test").with_custom_public_bucket_domain("cdn.example.com");
        assert_eq!(
            image_url(&upload_request(), "2024/01/test-upload", &config),
            "https://cdn.example.com/2024/01/test-upload"
        );
    }

    #[test]
    fn delete_url_sets_params_in_place() {
        let config = SnapConfig::new("test");
        assert_eq!(
            delete_url(&upload_request(), "2024/01/test-upload", &config),
            "https://i.example.com/delete?filename=2024%2F01%2Ftest-upload&authkey=test"
        );

        let with_key = Url::parse("https://i.example.com/upload?authkey=test&authkey=old").unwrap();
        assert_eq!(
            delete_url(&with_key, "a b", &config),
            "https://i.example.com/delete?authkey=test&filename=a+b"
        );
    }

    #[test]
    fn relative_targets_use_host_header() {
        let config = SnapConfig::new("test");
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "i.example.com".parse().unwrap());
        let uri: Uri = "/upload?filename=x".parse().unwrap();
        let url = request_url(&uri, &headers, &config).unwrap();
        assert_eq!(url.as_str(), "https://i.example.com/upload?filename=x");
        assert_eq!(query_param(&uri, "filename").as_deref(), Some("x"));
    }
}
