//! Pagination over GitHub's Link-header protocol.

/// One page of a paginated GitHub listing.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    /// Items on this page.
    pub items: Vec<T>,

    /// Page number to request next, `None` when this was the last page.
    pub next_page: Option<u32>,
}

impl<T> Paged<T> {
    /// A terminal page with the given items.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page: None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_page.is_none()
    }
}

/// Extract the next page number from a GitHub `Link` header.
///
/// GitHub returns headers like:
/// `<https://api.github.com/resource?page=2>; rel="next", <…?page=5>; rel="last"`
///
/// Returns `None` when there is no `rel="next"` entry or the URL carries no
/// parsable `page` parameter.
pub fn next_page_from_link(link_header: Option<&str>) -> Option<u32> {
    let header = link_header?;
    for link in header.split(',') {
        let mut parts = link.split(';');
        let url = parts.next()?.trim().trim_start_matches('<').trim_end_matches('>');
        let is_next = parts
            .any(|attr| attr.trim().trim_start_matches("rel=\"").trim_end_matches('"') == "next");
        if !is_next {
            continue;
        }
        let query = url.split_once('?').map(|(_, q)| q)?;
        for pair in query.split('&') {
            if let Some(("page", value)) = pair.split_once('=') {
                return value.parse().ok();
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
