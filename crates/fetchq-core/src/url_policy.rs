//! Source URL allow list.

use url::Url;

/// True when `url` may be queued under `allowed_domains`.
///
/// An empty list allows everything. Otherwise the URL's lowercased hostname
/// must end with one of the listed domains. Unparsable URLs and URLs
/// without a host are rejected once a list is configured.
pub fn is_url_allowed(url: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }
    let host = match Url::parse(url.trim()) {
        Ok(parsed) => match parsed.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return false,
        },
        Err(_) => return false,
    };
    allowed_domains
        .iter()
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .any(|d| host.ends_with(&d))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_list_allows_all() {
        assert!(is_url_allowed("https://anything.example/x", &[]));
        assert!(is_url_allowed("not a url", &[]));
    }

    #[test]
    fn hostname_suffix_match_is_case_insensitive() {
        let list = domains(&["YouTube.com", "vimeo.com"]);
        assert!(is_url_allowed("https://www.youtube.com/watch?v=1", &list));
        assert!(is_url_allowed("https://WWW.YOUTUBE.COM/watch?v=1", &list));
        assert!(is_url_allowed("https://vimeo.com/123", &list));
        assert!(!is_url_allowed("https://example.com/youtube.com", &list));
    }

    #[test]
    fn unparsable_or_hostless_rejected_when_list_set() {
        let list = domains(&["example.com"]);
        assert!(!is_url_allowed("example.com/video", &list));
        assert!(!is_url_allowed("file:///etc/passwd", &list));
    }
}
