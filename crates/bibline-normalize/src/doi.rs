//! DOI normalization
//!
//! The bare, lower-cased `10.<registrant>/<suffix>` form is the join key of
//! every DOI-keyed table.

/// Resolver prefixes accepted in front of a bare DOI (matched lower-case)
const RESOLVER_PREFIXES: &[&str] = &["doi:", "dx.doi.org/", "doi.org/", "www.doi.org/"];

/// Normalize a raw DOI string to its bare lower-case form.
///
/// Strips surrounding whitespace, any `http(s)://host/` prefix, and the
/// `doi:` / `doi.org/` resolver forms. Returns `None` unless the result is
/// `10.<registrant>/<suffix>` with non-empty parts and no whitespace.
///
/// ```
/// use bibline_normalize::doi::normalize_doi;
///
/// assert_eq!(
///     normalize_doi("https://doi.org/10.1038/S41586-018-0102-6").as_deref(),
///     Some("10.1038/s41586-018-0102-6")
/// );
/// assert_eq!(normalize_doi("not a doi"), None);
/// ```
pub fn normalize_doi(raw: &str) -> Option<String> {
    let lower = raw.trim().to_lowercase();
    let mut rest = lower.as_str();

    for scheme in ["https://", "http://"] {
        if let Some(after) = rest.strip_prefix(scheme) {
            // Drop the host, whatever resolver it is
            rest = after.split_once('/').map_or("", |(_, path)| path);
            break;
        }
    }
    for prefix in RESOLVER_PREFIXES {
        if let Some(after) = rest.strip_prefix(prefix) {
            rest = after;
            break;
        }
    }
    let bare = rest.trim();

    is_valid_bare_doi(bare).then(|| bare.to_string())
}

/// `10.<registrant>/<suffix>`, no whitespace, both parts non-empty
pub fn is_valid_bare_doi(doi: &str) -> bool {
    let Some(body) = doi.strip_prefix("10.") else {
        return false;
    };
    let Some((registrant, suffix)) = body.split_once('/') else {
        return false;
    };
    !registrant.is_empty() && !suffix.is_empty() && !doi.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_resolver_url() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1/ABC").as_deref(),
            Some("10.1/abc")
        );
        assert_eq!(
            normalize_doi("HTTP://DX.DOI.ORG/10.1000/xyz").as_deref(),
            Some("10.1000/xyz")
        );
    }

    #[test]
    fn strips_any_host() {
        assert_eq!(
            normalize_doi("https://example.org/10.5555/12345678").as_deref(),
            Some("10.5555/12345678")
        );
    }

    #[test]
    fn accepts_bare_and_prefixed_forms() {
        assert_eq!(normalize_doi("10.1/abc").as_deref(), Some("10.1/abc"));
        assert_eq!(normalize_doi("  doi:10.1/ABC ").as_deref(), Some("10.1/abc"));
        assert_eq!(normalize_doi("doi.org/10.1/abc").as_deref(), Some("10.1/abc"));
    }

    #[test]
    fn keeps_inner_slashes() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1002/(SICI)1097/abc").as_deref(),
            Some("10.1002/(sici)1097/abc")
        );
    }

    #[test]
    fn rejects_malformed() {
        for raw in [
            "",
            "   ",
            "abc",
            "10.1abc",
            "11.1/abc",
            "10./abc",
            "10.1/",
            "10.1/a b",
            "https://doi.org/",
            "https://doi.org",
        ] {
            assert_eq!(normalize_doi(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn normalized_is_fixed_point() {
        let once = normalize_doi("https://doi.org/10.1/ABC").unwrap();
        assert_eq!(normalize_doi(&once).as_deref(), Some(once.as_str()));
    }
}
