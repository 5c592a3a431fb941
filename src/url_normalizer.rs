//! URL canonicalization for scraped links
//!
//! Scraped hrefs are frequently relative, use backslashes, contain literal
//! spaces or carry a broken scheme (`https:/host`). `normalize_url` repairs
//! these and resolves the result against the page URL.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::errors::UrlError;

/// Schemes a normalized URL may carry
pub const ALLOWED_SCHEMES: [&str; 4] = ["http", "https", "s3", "file"];

static SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").expect("scheme regex"));
static SLASH_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/{2,}").expect("slash regex"));

/// Normalize `path` and, when `base` is given, resolve it against `base`.
///
/// An absolute `path` replaces `base` entirely; a protocol-relative one
/// (`//host/x`) adopts the base scheme. Without a base, relative input is
/// returned cleaned but still relative.
pub fn normalize_url(path: &str, base: Option<&str>) -> Result<String, UrlError> {
    let cleaned = clean_reference(path);
    if let Some(scheme) = scheme_of(&cleaned) {
        check_scheme(&scheme)?;
    }

    match base.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => {
            let base_cleaned = clean_reference(base);
            let base_scheme =
                scheme_of(&base_cleaned).ok_or_else(|| UrlError::MissingBaseScheme(base.to_string()))?;
            check_scheme(&base_scheme)?;

            let base_url = parse(&base_cleaned)?;
            let joined = base_url.join(&cleaned).map_err(|e| UrlError::Parse {
                url: cleaned.clone(),
                reason: e.to_string(),
            })?;
            Ok(joined.to_string())
        }
        None => match scheme_of(&cleaned) {
            Some(_) => Ok(parse(&cleaned)?.to_string()),
            None => Ok(cleaned),
        },
    }
}

/// True when the host (or, for hostless URLs, the path) contains a dot.
pub fn has_tld(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            parsed.host_str().map_or(false, |h| h.contains('.')) || parsed.path().contains('.')
        }
        Err(_) => url.contains('.'),
    }
}

/// Lowercased scheme of `url`, if it has one.
pub fn scheme_of(url: &str) -> Option<String> {
    SCHEME_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

fn check_scheme(scheme: &str) -> Result<(), UrlError> {
    if ALLOWED_SCHEMES.contains(&scheme) {
        Ok(())
    } else {
        Err(UrlError::DisallowedScheme(scheme.to_string()))
    }
}

fn parse(url: &str) -> Result<Url, UrlError> {
    Url::parse(url).map_err(|e| UrlError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Scheme repair, slash canonicalization and space encoding.
/// Query and fragment are kept verbatim apart from space encoding.
fn clean_reference(raw: &str) -> String {
    let trimmed = raw.trim();
    let split = trimmed.find(|c| c == '?' || c == '#').unwrap_or(trimmed.len());
    let (head, tail) = trimmed.split_at(split);

    let head = head.replace('\\', "/");
    let head = repair_scheme(&head);
    let head = collapse_path_slashes(&head);

    format!("{}{}", head, tail).replace(' ', "%20")
}

/// `https:/host`, `http:host` and `https:///host` become `scheme://host`.
fn repair_scheme(head: &str) -> String {
    let lower = head.to_ascii_lowercase();
    for scheme in ["https", "http"] {
        let prefix_len = scheme.len() + 1;
        if !lower.starts_with(&format!("{}:", scheme)) || lower.starts_with(&format!("{}://", scheme)) {
            continue;
        }
        let rest = &head[prefix_len..];
        // Without a dot there is no host boundary to search before
        let rest = match rest.find('.') {
            Some(dot) => match rest[..dot].rfind('/') {
                Some(slash) => &rest[slash + 1..],
                None => rest,
            },
            None => rest.trim_start_matches('/'),
        };
        return format!("{}://{}", scheme, rest);
    }

    // Extra slashes after a well-formed scheme (`https:///host`)
    if let Some(scheme) = scheme_of(head) {
        if scheme == "http" || scheme == "https" {
            let rest = head[scheme.len() + 1..].trim_start_matches('/');
            return format!("{}://{}", scheme, rest);
        }
    }

    head.to_string()
}

/// Collapse `//` runs in the path while leaving the authority alone.
fn collapse_path_slashes(head: &str) -> String {
    let authority_start = if let Some(scheme) = scheme_of(head) {
        let after_scheme = scheme.len() + 1;
        if head[after_scheme..].starts_with("//") {
            Some(after_scheme + 2)
        } else {
            None
        }
    } else if head.starts_with("//") {
        Some(2)
    } else {
        None
    };

    let path_start = match authority_start {
        Some(start) => head[start..].find('/').map(|i| start + i),
        None => Some(scheme_of(head).map_or(0, |s| s.len() + 1)),
    };

    match path_start {
        Some(start) => {
            let (prefix, path) = head.split_at(start);
            format!("{}{}", prefix, SLASH_RUN_RE.replace_all(path, "/"))
        }
        None => head.to_string(),
    }
}
