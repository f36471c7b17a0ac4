use regex::Regex;

/// Target of the `rel` entry in a `Link` header.
pub fn find_rel<'a>(header: &'a str, rel: &str) -> Option<&'a str> {
    let re = Regex::new(r#"<([^>]+)>\s*;\s*rel="([^"]+)""#).ok()?;

    let target = re
        .captures_iter(header)
        .find(|caps| caps.get(2).is_some_and(|r| r.as_str() == rel))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());
    target
}

/// Page number of the `rel="last"` link. With `per_page=1` this is the total
/// item count.
pub fn last_page(header: &str) -> Option<u64> {
    let url = find_rel(header, "last")?;
    let re = Regex::new(r"[?&]page=(\d+)").ok()?;

    re.captures(url)?.get(1)?.as_str().parse().ok()
}

pub fn has_next(header: &str) -> bool {
    find_rel(header, "next").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<https://api.github.com/repositories/1/commits?per_page=1&page=2>; rel="next", <https://api.github.com/repositories/1/commits?per_page=1&page=1873>; rel="last""#;

    #[test]
    fn parses_last_page() {
        assert_eq!(last_page(HEADER), Some(1873));
        assert!(has_next(HEADER));
    }

    #[test]
    fn last_page_missing_on_final_page() {
        let header = r#"<https://api.github.com/x?page=1>; rel="prev", <https://api.github.com/x?page=1>; rel="first""#;
        assert_eq!(last_page(header), None);
        assert!(!has_next(header));
    }

    #[test]
    fn page_parameter_must_be_standalone() {
        let header = r#"<https://api.github.com/x?per_page=100>; rel="last""#;
        assert_eq!(last_page(header), None);
    }
}
