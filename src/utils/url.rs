//! Query string helpers for stream URLs

use url::{form_urlencoded, Url};

/// Parse an `&`-separated `key=value` string into ordered, percent-decoded pairs
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Get the decoded value of the first query parameter named `key`
pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Replace the value of every `key` parameter, leaving all other parameters
/// byte-for-byte untouched and in their original order.
pub fn replace_query_param(url: &Url, key: &str, value: &str) -> Url {
    let Some(query) = url.query() else {
        return url.clone();
    };

    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    let rewritten: Vec<String> = query
        .split('&')
        .map(|segment| {
            let raw_key = segment.split('=').next().unwrap_or("");
            let matches = form_urlencoded::parse(raw_key.as_bytes())
                .next()
                .map(|(k, _)| k == key)
                .unwrap_or(false);
            if matches {
                format!("{}={}", raw_key, encoded)
            } else {
                segment.to_string()
            }
        })
        .collect();

    let mut updated = url.clone();
    updated.set_query(Some(&rewritten.join("&")));
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_string() {
        let pairs = parse_query_string("url=https%3A%2F%2Fx.test%2Fv&sp=sig&s=AB%3DCD");
        assert_eq!(
            pairs,
            vec![
                ("url".to_string(), "https://x.test/v".to_string()),
                ("sp".to_string(), "sig".to_string()),
                ("s".to_string(), "AB=CD".to_string()),
            ]
        );
    }

    #[test]
    fn test_replace_query_param_preserves_order() {
        let url = Url::parse("https://x.test/v?a=1&n=abc&sparams=ip%2Cn&z=last").unwrap();
        let updated = replace_query_param(&url, "n", "zyx");
        assert_eq!(
            updated.as_str(),
            "https://x.test/v?a=1&n=zyx&sparams=ip%2Cn&z=last"
        );
        assert_eq!(query_param(&updated, "n").as_deref(), Some("zyx"));
    }

    #[test]
    fn test_replace_query_param_encodes_value() {
        let url = Url::parse("https://x.test/v?n=abc").unwrap();
        let updated = replace_query_param(&url, "n", "a/b c");
        assert_eq!(query_param(&updated, "n").as_deref(), Some("a/b c"));
    }

    #[test]
    fn test_replace_query_param_without_query() {
        let url = Url::parse("https://x.test/v").unwrap();
        assert_eq!(replace_query_param(&url, "n", "x"), url);
    }
}
