//! Utility functions and helpers.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

static FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"filename="([^"]*)""#).expect("static regex"));

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Id carried by a resource link: the first query value (`view.php?id=123` → `123`).
pub fn resource_id(href: &str) -> Option<String> {
    let (_, rest) = href.split_once('=')?;
    let id = rest.split(['&', '#']).next().unwrap_or(rest);
    (!id.is_empty()).then(|| id.to_string())
}

/// Value of a named query parameter.
pub fn query_param(url_str: &str, name: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Course name as used for directories: whitespace tokens joined by `_`.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Strip path separators and control characters from a server-supplied name.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Directory name for a course: a single path component under the session root.
///
/// Falls back to `course_{id}` when nothing usable is left of the name.
pub fn course_dir_name(name: &str, id: &str) -> String {
    sanitize_file_name(name)
        .filter(|dir| dir != "." && dir != "..")
        .unwrap_or_else(|| {
            let id = sanitize_file_name(id).unwrap_or_default();
            format!("course_{id}")
        })
}

/// File name from a `Content-Disposition` header value.
pub fn disposition_file_name(header: &str) -> Option<String> {
    FILENAME
        .captures(header)
        .and_then(|caps| caps.get(1))
        .and_then(|m| sanitize_file_name(m.as_str()))
}

/// Name used when the server does not provide one, unique per URL.
pub fn fallback_file_name(base: &str, url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{}_{}", base, &hex::encode(digest)[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://moodle.iitb.ac.in/my/courses.php"),
            Some("moodle.iitb.ac.in".to_string())
        );
    }

    #[test]
    fn test_resource_id() {
        assert_eq!(
            resource_id("https://m/mod/resource/view.php?id=123"),
            Some("123".to_string())
        );
        assert_eq!(
            resource_id("https://m/mod/resource/view.php?id=9&redirect=1"),
            Some("9".to_string())
        );
        assert_eq!(resource_id("https://m/mod/resource/view.php"), None);
    }

    #[test]
    fn test_query_param() {
        assert_eq!(
            query_param("https://m/course/view.php?id=42", "id"),
            Some("42".to_string())
        );
        assert_eq!(query_param("https://m/course/view.php", "id"), None);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  CS 101 :\n Intro  "), "CS_101_:_Intro");
    }

    #[test]
    fn test_course_dir_name_is_one_component() {
        assert_eq!(course_dir_name("CS_101", "42"), "CS_101");
        assert_eq!(course_dir_name("/tmp/escape", "9"), "_tmp_escape");
        assert_eq!(course_dir_name("..", "9"), "course_9");
        assert_eq!(course_dir_name(".", "9"), "course_9");
        assert_eq!(course_dir_name("", "../9"), "course__9");
    }

    #[test]
    fn test_disposition_file_name() {
        assert_eq!(
            disposition_file_name(r#"inline; filename="Lecture 1.pdf""#),
            Some("Lecture 1.pdf".to_string())
        );
        assert_eq!(
            disposition_file_name(r#"attachment; filename="../../etc/passwd""#),
            Some("_.._etc_passwd".to_string())
        );
        assert_eq!(disposition_file_name("attachment"), None);
    }

    #[test]
    fn test_fallback_file_name_is_stable() {
        let a = fallback_file_name("download", "https://m/1");
        let b = fallback_file_name("download", "https://m/1");
        let c = fallback_file_name("download", "https://m/2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("download_"));
    }
}
