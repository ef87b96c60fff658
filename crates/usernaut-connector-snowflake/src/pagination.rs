//! HTTP `Link` header parsing.
//!
//! Two patterns tolerate `rel` appearing before or after other parameters in
//! each link segment.

use regex::Regex;

/// Parsed lazily once per connector; the patterns themselves are static.
pub struct LinkParser {
    forward: Regex,
    reverse: Regex,
}

impl LinkParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            // rel after other parameters
            forward: Regex::new(r#"<([^>]+)>\s*;\s*(?:[^,]*;\s*)*rel="([^"]+)"(?:\s*;[^,]*)*"#)
                .expect("forward link pattern is valid"),
            // rel immediately after the target
            reverse: Regex::new(r#"<([^>]+)>\s*;\s*rel="([^"]+)"(?:\s*;[^,]*)*"#)
                .expect("reverse link pattern is valid"),
        }
    }

    /// Extract the URL for the given `rel` from a `Link` header value.
    #[must_use]
    pub fn rel(&self, link_header: &str, rel: &str) -> Option<String> {
        for captures in self.forward.captures_iter(link_header) {
            if &captures[2] == rel {
                return Some(captures[1].to_string());
            }
        }
        for captures in self.reverse.captures_iter(link_header) {
            if &captures[2] == rel {
                return Some(captures[1].to_string());
            }
        }
        None
    }
}

impl Default for LinkParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rel_last() {
        let parser = LinkParser::new();
        let header = r#"</api/v2/users?page=2>; rel="next""#;
        assert_eq!(parser.rel(header, "next").as_deref(), Some("/api/v2/users?page=2"));
    }

    #[test]
    fn test_rel_after_other_parameters() {
        let parser = LinkParser::new();
        let header = r#"</api/v2/users?page=2>; type="application/json"; rel="next""#;
        assert_eq!(parser.rel(header, "next").as_deref(), Some("/api/v2/users?page=2"));
    }

    #[test]
    fn test_rel_before_other_parameters() {
        let parser = LinkParser::new();
        let header = r#"</api/v2/users?page=2>; rel="next"; type="application/json""#;
        assert_eq!(parser.rel(header, "next").as_deref(), Some("/api/v2/users?page=2"));
    }

    #[test]
    fn test_multiple_links() {
        let parser = LinkParser::new();
        let header =
            r#"</api/v2/users?page=1>; rel="prev", </api/v2/users?page=3>; rel="next""#;
        assert_eq!(parser.rel(header, "next").as_deref(), Some("/api/v2/users?page=3"));
        assert_eq!(parser.rel(header, "prev").as_deref(), Some("/api/v2/users?page=1"));
    }

    #[test]
    fn test_no_next() {
        let parser = LinkParser::new();
        let header = r#"</api/v2/users?page=1>; rel="prev""#;
        assert_eq!(parser.rel(header, "next"), None);
    }

    #[test]
    fn test_empty_header() {
        let parser = LinkParser::new();
        assert_eq!(parser.rel("", "next"), None);
    }
}
