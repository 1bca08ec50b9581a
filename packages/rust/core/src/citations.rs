//! Citation construction, trust ranking and deduplication.

use std::collections::HashSet;

use proposalgen_shared::{Citation, ResultItem, TrustTier};

/// Build a citation for `url`, ranking it against the authoritative list.
pub fn cite(url: &str, title: &str, authoritative_domains: &[String]) -> Citation {
    let url = url.trim();
    let title = title.trim();
    Citation {
        url: url.to_string(),
        title: if title.is_empty() {
            url.to_string()
        } else {
            title.to_string()
        },
        tier: TrustTier::classify(url, authoritative_domains),
    }
}

pub fn cite_item(item: &ResultItem, authoritative_domains: &[String]) -> Citation {
    cite(&item.url, &item.title, authoritative_domains)
}

/// Key used to decide whether two citations point at the same source.
///
/// http and https, a leading `www.` and a trailing slash do not make two
/// web URLs distinct; the host is compared case-insensitively.
fn dedup_key(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return url.to_string();
    }
    let (host, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    format!("{host}{path}")
}

/// Drop repeated URLs, keeping the first occurrence and the original order.
pub fn dedup<I>(citations: I) -> Vec<Citation>
where
    I: IntoIterator<Item = Citation>,
{
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| !c.url.trim().is_empty())
        .filter(|c| seen.insert(dedup_key(&c.url)))
        .collect()
}

/// Count distinct citations at or above `min_tier`.
pub fn count_authoritative(citations: &[Citation], min_tier: TrustTier) -> usize {
    citations
        .iter()
        .filter(|c| c.tier >= min_tier)
        .map(|c| dedup_key(&c.url))
        .collect::<HashSet<_>>()
        .len()
}
