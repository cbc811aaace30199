//! Tests for Link-header pagination parsing.

use super::*;

#[test]
fn test_parses_next_page_from_github_link_header() {
    let header = r#"<https://api.github.com/repositories/1/pulls?state=all&page=2>; rel="next", <https://api.github.com/repositories/1/pulls?state=all&page=9>; rel="last""#;
    assert_eq!(next_page_from_link(Some(header)), Some(2));
}

#[test]
fn test_no_next_rel_means_last_page() {
    let header = r#"<https://api.github.com/repositories/1/pulls?page=1>; rel="first", <https://api.github.com/repositories/1/pulls?page=1>; rel="prev""#;
    assert_eq!(next_page_from_link(Some(header)), None);
}

#[test]
fn test_missing_header_means_single_page() {
    assert_eq!(next_page_from_link(None), None);
}

#[test]
fn test_malformed_header_is_ignored() {
    assert_eq!(next_page_from_link(Some("not a link header")), None);
    assert_eq!(
        next_page_from_link(Some(r#"<https://api.github.com/x>; rel="next""#)),
        None,
        "next link without a page parameter yields None"
    );
}

#[test]
fn test_paged_last_constructor() {
    let page = Paged::last(vec![1, 2, 3]);
    assert!(page.is_last());
    assert_eq!(page.items.len(), 3);
}
