//! Continuation rules for each [`PaginationStrategy`].

use harvest_types::{HttpRequest, Page};
use harvest_util::value_at_path;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::model::PaginationStrategy;

/// Base used to resolve relative next-page URLs; only path and query are kept.
const RELATIVE_URL_BASE: &str = "http://localhost/";

impl PaginationStrategy {
    /// Adjusts the first call of a context (offset strategies send their starting position).
    pub fn first_request(&self, mut request: HttpRequest) -> HttpRequest {
        match self {
            PaginationStrategy::PageOffset { param_name, first_page, .. } => {
                request
                    .query_args
                    .entry(param_name.clone())
                    .or_insert_with(|| Value::from(*first_page));
            }
            PaginationStrategy::ItemOffset { param_name, first_index, .. } => {
                request
                    .query_args
                    .entry(param_name.clone())
                    .or_insert_with(|| Value::from(*first_index));
            }
            _ => {}
        }
        request
    }

    /// Derives the next call from the page just received, or `None` when traversal is done.
    pub fn next_request(&self, page: &Page, current: &HttpRequest) -> Option<HttpRequest> {
        match self {
            PaginationStrategy::None => None,
            PaginationStrategy::Token { token_field, param_name } => {
                let token = value_at_path(&page.data, token_field)?;
                if token.is_null() || token.as_str().is_some_and(str::is_empty) {
                    return None;
                }
                let mut next = current.clone();
                next.query_args.insert(param_name.clone(), token.clone());
                Some(next)
            }
            PaginationStrategy::Cursor {
                next_page_field,
                path_checker,
            } => {
                let next_url = value_at_path(&page.data, next_page_field)?.as_str()?;
                follow_next_url(next_url, path_checker.as_deref(), current)
            }
            PaginationStrategy::LinkHeader { path_checker } => {
                let next_url = next_link(page.header("link")?)?;
                follow_next_url(next_url, path_checker.as_deref(), current)
            }
            PaginationStrategy::PageOffset {
                param_name,
                first_page,
                page_size,
                items_field,
            } => {
                let item_count = count_items(&page.data, items_field.as_deref());
                if item_count == 0 || item_count < *page_size {
                    return None;
                }
                let current_page = current.query_args.get(param_name).and_then(value_as_u64).unwrap_or(*first_page);
                let next_page = advance(param_name, current_page, 1, current)?;
                let mut next = current.clone();
                next.query_args.insert(param_name.clone(), Value::from(next_page));
                Some(next)
            }
            PaginationStrategy::ItemOffset {
                param_name,
                first_index,
                page_size,
                items_field,
            } => {
                let item_count = count_items(&page.data, items_field.as_deref());
                if item_count == 0 || item_count < *page_size {
                    return None;
                }
                let current_offset = current.query_args.get(param_name).and_then(value_as_u64).unwrap_or(*first_index);
                let next_offset = advance(param_name, current_offset, item_count, current)?;
                let mut next = current.clone();
                next.query_args.insert(param_name.clone(), Value::from(next_offset));
                Some(next)
            }
        }
    }
}

/// Builds the call for a next-page URL.
///
/// The URL path must end with `path_checker`, or with the current path when no
/// checker is configured; anything else ends the traversal. The current path
/// is kept and the URL's query pairs override the current query args.
fn follow_next_url(next_url: &str, path_checker: Option<&str>, current: &HttpRequest) -> Option<HttpRequest> {
    if next_url.is_empty() {
        return None;
    }
    let parsed = match Url::parse(RELATIVE_URL_BASE).and_then(|base| base.join(next_url)) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(path = %current.path, next_url, error = %error, "could not parse next page url, stopping pagination");
            return None;
        }
    };

    let expected_path = path_checker.unwrap_or(&current.path);
    if !parsed.path().ends_with(expected_path) {
        warn!(
            path = %current.path,
            next_path = %parsed.path(),
            expected_path,
            "next page url points at a different path, stopping pagination"
        );
        return None;
    }

    let mut next = current.clone();
    for (name, value) in query_pairs_to_args(&parsed) {
        next.query_args.insert(name, value);
    }
    debug!(path = %next.path, query_arg_count = next.query_args.len(), "following next page url");
    Some(next)
}

/// Groups query pairs by name; repeated names become arrays.
fn query_pairs_to_args(url: &Url) -> Map<String, Value> {
    let mut args = Map::new();
    for (name, value) in url.query_pairs() {
        let value = Value::String(value.into_owned());
        match args.get_mut(&*name) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                args.insert(name.into_owned(), value);
            }
        }
    }
    args
}

/// Offset arithmetic for the offset strategies; overflow ends the traversal.
fn advance(param_name: &str, position: u64, step: u64, current: &HttpRequest) -> Option<u64> {
    let next = position.checked_add(step);
    if next.is_none() {
        warn!(path = %current.path, param_name, position, step, "pagination offset overflowed, stopping pagination");
    }
    next
}

/// Target of the `rel="next"` entry of a `link` header.
///
/// Entries are delimited by their `<...>` targets, so commas inside a URL do
/// not split it.
fn next_link(header: &str) -> Option<&str> {
    let mut rest = header;
    while let Some(open) = rest.find('<') {
        let after_open = &rest[open + 1..];
        let close = after_open.find('>')?;
        let target = after_open[..close].trim();
        let after_target = &after_open[close + 1..];
        let params_end = after_target.find('<').unwrap_or(after_target.len());
        let params = after_target[..params_end].trim().trim_end_matches(',');
        if params.split(';').any(is_rel_next) {
            return Some(target);
        }
        rest = &after_target[params_end..];
    }
    None
}

fn is_rel_next(param: &str) -> bool {
    param.split_once('=').is_some_and(|(key, value)| {
        key.trim().eq_ignore_ascii_case("rel")
            && value
                .trim()
                .trim_matches('"')
                .split_whitespace()
                .any(|relation| relation.eq_ignore_ascii_case("next"))
    })
}

fn count_items(data: &Value, items_field: Option<&str>) -> u64 {
    let items = match items_field {
        Some(field) => value_at_path(data, field),
        None => Some(data),
    };
    items.and_then(Value::as_array).map_or(0, |items| items.len() as u64)
}

fn value_as_u64(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_str()?.trim().parse().ok())
}
