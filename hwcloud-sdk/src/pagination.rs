//! Pagination
//!
//! A [`Pager`] walks a list API page by page. The [`PageFetcher`] issues one GET
//! per page (implemented by `ServiceClient`), the [`PageStrategy`] knows where the
//! items are and how to build the next page URL.
//!
//! Every strategy stops on an empty page. The pager also stops when a strategy
//! produces a URL it has already fetched.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use crate::error::Result;
use crate::extract::{path_search, path_search_list, path_search_str};

/// Fetch one page as JSON.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<Value>;
}

/// Item extraction and next-page computation for one pagination flavor.
pub trait PageStrategy: Send + Sync {
    /// Items on a page.
    fn items(&self, page: &Value) -> Vec<Value>;

    /// URL of the following page, or `None` when this was the last one.
    fn next_url(&self, current_url: &str, page: &Value, items: &[Value]) -> Option<String>;
}

/// Read a query parameter from a URL.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Replace (or add) query parameters.
///
/// Untouched pairs are kept byte for byte so the query string signed for later pages
/// encodes values the same way as the first page. New values are percent-encoded like
/// [`build_query_string`](crate::request::build_query_string) does.
pub fn set_query_params(url: &str, params: &[(&str, String)]) -> Option<String> {
    Url::parse(url).ok()?;
    let (base, query) = url.split_once('?').unwrap_or((url, ""));
    let replaced: Vec<String> = params.iter().map(|(k, _)| urlencoding::encode(k).into_owned()).collect();

    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(k, _)| k);
            !replaced.iter().any(|r| r == key)
        })
        .map(str::to_string)
        .collect();
    pairs.extend(
        params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))),
    );
    Some(format!("{base}?{}", pairs.join("&")))
}

/// One request, no further pages.
#[derive(Debug, Clone)]
pub struct SinglePage {
    pub items_path: String,
}

impl SinglePage {
    pub fn new(items_path: impl Into<String>) -> Self {
        Self {
            items_path: items_path.into(),
        }
    }
}

impl PageStrategy for SinglePage {
    fn items(&self, page: &Value) -> Vec<Value> {
        path_search_list(&self.items_path, page)
    }

    fn next_url(&self, _: &str, _: &Value, _: &[Value]) -> Option<String> {
        None
    }
}

/// The body carries the next page URL (`links.next`).
#[derive(Debug, Clone)]
pub struct LinkedPage {
    pub items_path: String,
    pub next_path: String,
}

impl LinkedPage {
    pub fn new(items_path: impl Into<String>) -> Self {
        Self {
            items_path: items_path.into(),
            next_path: "links.next".to_string(),
        }
    }

    #[must_use]
    pub fn next_path(mut self, path: impl Into<String>) -> Self {
        self.next_path = path.into();
        self
    }
}

impl PageStrategy for LinkedPage {
    fn items(&self, page: &Value) -> Vec<Value> {
        path_search_list(&self.items_path, page)
    }

    fn next_url(&self, _: &str, page: &Value, items: &[Value]) -> Option<String> {
        if items.is_empty() {
            return None;
        }
        path_search_str(&self.next_path, page).filter(|next| !next.is_empty())
    }
}

/// Marker pagination: the next page starts after the last item seen.
///
/// The marker comes from `next_marker_path` in the body when set, otherwise from
/// `marker_field` of the last item.
#[derive(Debug, Clone)]
pub struct MarkerPage {
    pub items_path: String,
    pub marker_param: String,
    pub marker_field: String,
    pub next_marker_path: Option<String>,
    pub limit: Option<usize>,
}

impl MarkerPage {
    pub fn new(items_path: impl Into<String>) -> Self {
        Self {
            items_path: items_path.into(),
            marker_param: "marker".to_string(),
            marker_field: "id".to_string(),
            next_marker_path: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn marker_param(mut self, param: impl Into<String>) -> Self {
        self.marker_param = param.into();
        self
    }

    #[must_use]
    pub fn marker_field(mut self, field: impl Into<String>) -> Self {
        self.marker_field = field.into();
        self
    }

    #[must_use]
    pub fn next_marker_path(mut self, path: impl Into<String>) -> Self {
        self.next_marker_path = Some(path.into());
        self
    }

    /// Page size; a shorter page is the last one.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl PageStrategy for MarkerPage {
    fn items(&self, page: &Value) -> Vec<Value> {
        path_search_list(&self.items_path, page)
    }

    fn next_url(&self, current_url: &str, page: &Value, items: &[Value]) -> Option<String> {
        if items.is_empty() || self.limit.is_some_and(|limit| items.len() < limit) {
            return None;
        }
        let marker = match &self.next_marker_path {
            Some(path) => path_search(path, page),
            None => items.last().and_then(|last| path_search(&self.marker_field, last)),
        }?;
        let marker = match marker {
            Value::String(s) if s.is_empty() => return None,
            Value::String(s) => s,
            other => other.to_string(),
        };
        set_query_params(current_url, &[(self.marker_param.as_str(), marker)])
    }
}

/// Offset/limit pagination.
#[derive(Debug, Clone)]
pub struct OffsetPage {
    pub items_path: String,
    pub offset_param: String,
    pub limit_param: String,
    pub limit: usize,
    /// Path of the total item count in the body, when the API reports one.
    pub total_path: Option<String>,
}

impl OffsetPage {
    pub fn new(items_path: impl Into<String>, limit: usize) -> Self {
        Self {
            items_path: items_path.into(),
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            limit,
            total_path: None,
        }
    }

    #[must_use]
    pub fn total_path(mut self, path: impl Into<String>) -> Self {
        self.total_path = Some(path.into());
        self
    }
}

impl PageStrategy for OffsetPage {
    fn items(&self, page: &Value) -> Vec<Value> {
        path_search_list(&self.items_path, page)
    }

    fn next_url(&self, current_url: &str, page: &Value, items: &[Value]) -> Option<String> {
        if items.is_empty() || items.len() < self.limit {
            return None;
        }
        let offset = query_param(current_url, &self.offset_param)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0)
            + items.len();
        let total = self
            .total_path
            .as_deref()
            .and_then(|path| path_search(path, page))
            .and_then(|v| v.as_u64());
        if total.is_some_and(|t| offset as u64 >= t) {
            return None;
        }

        let mut params = vec![(self.offset_param.as_str(), offset.to_string())];
        if query_param(current_url, &self.limit_param).is_none() {
            params.push((self.limit_param.as_str(), self.limit.to_string()));
        }
        set_query_params(current_url, &params)
    }
}

/// Page-number pagination (`page_no=1,2,...`).
#[derive(Debug, Clone)]
pub struct PageNumberPage {
    pub items_path: String,
    pub page_param: String,
    pub first_page: usize,
    pub limit: usize,
}

impl PageNumberPage {
    pub fn new(items_path: impl Into<String>, page_param: impl Into<String>, limit: usize) -> Self {
        Self {
            items_path: items_path.into(),
            page_param: page_param.into(),
            first_page: 1,
            limit,
        }
    }
}

impl PageStrategy for PageNumberPage {
    fn items(&self, page: &Value) -> Vec<Value> {
        path_search_list(&self.items_path, page)
    }

    fn next_url(&self, current_url: &str, _: &Value, items: &[Value]) -> Option<String> {
        if items.is_empty() || items.len() < self.limit {
            return None;
        }
        let current = query_param(current_url, &self.page_param)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(self.first_page);
        set_query_params(
            current_url,
            &[(self.page_param.as_str(), (current + 1).to_string())],
        )
    }
}

/// Iterates the pages of a list API.
pub struct Pager<'a, F: PageFetcher + ?Sized, S: PageStrategy> {
    fetcher: &'a F,
    initial_url: String,
    strategy: S,
}

impl<'a, F: PageFetcher + ?Sized, S: PageStrategy> Pager<'a, F, S> {
    pub fn new(fetcher: &'a F, url: impl Into<String>, strategy: S) -> Self {
        Self {
            fetcher,
            initial_url: url.into(),
            strategy,
        }
    }

    /// Call `handler` with the items of each page until it returns `false` or the
    /// pages run out.
    pub async fn each_page<H>(&self, mut handler: H) -> Result<()>
    where
        H: FnMut(Vec<Value>) -> Result<bool> + Send,
    {
        let mut url = self.initial_url.clone();
        let mut seen = HashSet::new();

        loop {
            seen.insert(url.clone());
            let page = self.fetcher.fetch_page(&url).await?;
            let items = self.strategy.items(&page);
            let next = self.strategy.next_url(&url, &page, &items);
            if items.is_empty() || !handler(items)? {
                return Ok(());
            }
            match next {
                Some(next) if !seen.contains(&next) => url = next,
                Some(next) => {
                    log::warn!("Pagination stopped: {next} was already fetched");
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    /// Items of all pages, in order.
    pub async fn all_items(&self) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        self.each_page(|items| {
            all.extend(items);
            Ok(true)
        })
        .await?;
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::error::SdkError;

    /// Serves canned pages by URL and records the requests.
    struct FakeFetcher {
        pages: HashMap<String, Value>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn new(pages: &[(&str, Value)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, page)| ((*url).to_string(), page.clone()))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().map(|r| r.clone()).unwrap()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch_page(&self, url: &str) -> Result<Value> {
            if let Ok(mut requested) = self.requested.lock() {
                requested.push(url.to_string());
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| SdkError::ResourceNotFound {
                    service: "fake".to_string(),
                    url: url.to_string(),
                    raw_message: None,
                })
        }
    }

    fn ids(items: &[Value]) -> Vec<&str> {
        items.iter().filter_map(|i| i["id"].as_str()).collect()
    }

    const BASE: &str = "https://svc.example.com/v1/p/items";

    #[tokio::test]
    async fn single_page_fetches_once() {
        let fetcher = FakeFetcher::new(&[(BASE, json!({"meshes": [{"id": "m1"}, {"id": "m2"}]}))]);
        let items = Pager::new(&fetcher, BASE, SinglePage::new("meshes"))
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["m1", "m2"]);
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[tokio::test]
    async fn linked_pages_follow_next() {
        let p2 = "https://svc.example.com/v2/zones?marker=z2";
        let fetcher = FakeFetcher::new(&[
            (BASE, json!({"zones": [{"id": "z1"}, {"id": "z2"}], "links": {"next": p2}})),
            (p2, json!({"zones": [{"id": "z3"}], "links": {"self": p2}})),
        ]);
        let items = Pager::new(&fetcher, BASE, LinkedPage::new("zones"))
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["z1", "z2", "z3"]);
    }

    #[tokio::test]
    async fn linked_self_reference_does_not_loop() {
        let fetcher = FakeFetcher::new(&[(
            BASE,
            json!({"zones": [{"id": "z1"}], "links": {"next": BASE}}),
        )]);
        let items = Pager::new(&fetcher, BASE, LinkedPage::new("zones"))
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["z1"]);
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[tokio::test]
    async fn marker_from_last_item_until_short_page() {
        let first = format!("{BASE}?limit=2");
        let second = format!("{BASE}?limit=2&marker=s2");
        let fetcher = FakeFetcher::new(&[
            (first.as_str(), json!({"subnets": [{"id": "s1"}, {"id": "s2"}]})),
            (second.as_str(), json!({"subnets": [{"id": "s3"}]})),
        ]);
        let items = Pager::new(&fetcher, first.clone(), MarkerPage::new("subnets").limit(2))
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["s1", "s2", "s3"]);
        assert_eq!(fetcher.requested(), vec![first, second]);
    }

    #[tokio::test]
    async fn marker_from_body_path() {
        let second = format!("{BASE}?marker=abc");
        let fetcher = FakeFetcher::new(&[
            (BASE, json!({"items": [{"id": "1"}], "page_info": {"next_marker": "abc"}})),
            (second.as_str(), json!({"items": [{"id": "2"}], "page_info": {}})),
        ]);
        let strategy = MarkerPage::new("items").next_marker_path("page_info.next_marker");
        let items = Pager::new(&fetcher, BASE, strategy)
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["1", "2"]);
    }

    #[tokio::test]
    async fn marker_stops_on_empty_page() {
        let second = format!("{BASE}?marker=s1");
        let fetcher = FakeFetcher::new(&[
            (BASE, json!({"subnets": [{"id": "s1"}]})),
            (second.as_str(), json!({"subnets": []})),
        ]);
        let items = Pager::new(&fetcher, BASE, MarkerPage::new("subnets"))
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["s1"]);
        assert_eq!(fetcher.requested().len(), 2);
    }

    #[tokio::test]
    async fn offset_advances_and_respects_total() {
        let first = format!("{BASE}?limit=2");
        let second = format!("{BASE}?limit=2&offset=2");
        let fetcher = FakeFetcher::new(&[
            (first.as_str(), json!({"vaults": [{"id": "v1"}, {"id": "v2"}], "count": 4})),
            (second.as_str(), json!({"vaults": [{"id": "v3"}, {"id": "v4"}], "count": 4})),
        ]);
        let strategy = OffsetPage::new("vaults", 2).total_path("count");
        let items = Pager::new(&fetcher, first, strategy)
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["v1", "v2", "v3", "v4"]);
        // total reached, no third request
        assert_eq!(fetcher.requested().len(), 2);
    }

    #[tokio::test]
    async fn offset_adds_limit_when_absent() {
        let second = format!("{BASE}?offset=1&limit=1");
        let fetcher = FakeFetcher::new(&[
            (BASE, json!({"vaults": [{"id": "v1"}]})),
            (second.as_str(), json!({"vaults": []})),
        ]);
        let items = Pager::new(&fetcher, BASE, OffsetPage::new("vaults", 1))
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["v1"]);
        assert_eq!(fetcher.requested().get(1), Some(&second));
    }

    #[tokio::test]
    async fn page_number_increments() {
        let second = format!("{BASE}?page_no=2");
        let fetcher = FakeFetcher::new(&[
            (BASE, json!({"list": [{"id": "a"}, {"id": "b"}]})),
            (second.as_str(), json!({"list": [{"id": "c"}]})),
        ]);
        let items = Pager::new(&fetcher, BASE, PageNumberPage::new("list", "page_no", 2))
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn handler_can_stop_early() {
        let second = format!("{BASE}?marker=s1");
        let fetcher = FakeFetcher::new(&[
            (BASE, json!({"subnets": [{"id": "s1"}]})),
            (second.as_str(), json!({"subnets": [{"id": "s2"}]})),
        ]);
        let mut pages = 0;
        let result = Pager::new(&fetcher, BASE, MarkerPage::new("subnets"))
            .each_page(|_| {
                pages += 1;
                Ok(false)
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(pages, 1);
    }

    #[tokio::test]
    async fn fetch_error_propagates() {
        let fetcher = FakeFetcher::new(&[]);
        let result = Pager::new(&fetcher, BASE, SinglePage::new("x")).all_items().await;
        assert!(matches!(result, Err(SdkError::ResourceNotFound { .. })));
    }

    #[test]
    fn query_helpers() {
        let url = format!("{BASE}?limit=10&marker=a");
        assert_eq!(query_param(&url, "limit").as_deref(), Some("10"));
        assert_eq!(
            set_query_params(&url, &[("marker", "b".to_string())]).as_deref(),
            Some("https://svc.example.com/v1/p/items?limit=10&marker=b")
        );
    }

    #[test]
    fn set_query_params_keeps_existing_encoding() {
        let url = format!("{BASE}?limit=2&name=my%20vault&tag=a%2Cb");
        assert_eq!(
            set_query_params(&url, &[("offset", "2".to_string())]).as_deref(),
            Some("https://svc.example.com/v1/p/items?limit=2&name=my%20vault&tag=a%2Cb&offset=2")
        );
        assert_eq!(
            set_query_params(BASE, &[("marker", "a b".to_string())]).as_deref(),
            Some("https://svc.example.com/v1/p/items?marker=a%20b")
        );
    }

    #[tokio::test]
    async fn offset_pages_sign_the_same_filter_encoding() {
        let first = format!("{BASE}?limit=2&name=my%20vault");
        let second = format!("{BASE}?limit=2&name=my%20vault&offset=2");
        let fetcher = FakeFetcher::new(&[
            (first.as_str(), json!({"vaults": [{"id": "v1"}, {"id": "v2"}]})),
            (second.as_str(), json!({"vaults": [{"id": "v3"}]})),
        ]);
        let items = Pager::new(&fetcher, first.clone(), OffsetPage::new("vaults", 2))
            .all_items()
            .await
            .unwrap();
        assert_eq!(ids(&items), ["v1", "v2", "v3"]);
        assert_eq!(fetcher.requested(), vec![first, second]);
    }
}
