//! Breadth-first documentation crawler.
//!
//! Starts at the root URL (depth 0) and follows `<a href>` links whose
//! absolute form stays under the root directory (the root path with a
//! trailing `/`, so `/guides` never admits `/guidestore`). A page at depth `d` is only
//! expanded while `d + 1 < max_depth`. Fragments are stripped before
//! deduplication. Fetch or conversion failures skip the page.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use htmd::HtmlToMarkdown;
use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::RagConfig;
use crate::error::AppError;

/// Double-quoted, single-quoted or bare attribute value, in groups 1 to 3.
const HREF_PATTERN: &str = r#"(?i)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#;

/// One fetched page, already converted to Markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub url: String,
    pub markdown: String,
}

pub struct Crawler {
    client: Client,
    root: Url,
    /// Directory prefix every followed link must start with.
    scope: String,
    max_depth: usize,
    max_pages: usize,
    href: Regex,
}

impl Crawler {
    pub fn new(config: &RagConfig) -> Result<Self, AppError> {
        let root = Url::parse(&config.root_url)
            .map_err(|e| AppError::Config(format!("rag.root_url '{}': {e}", config.root_url)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.crawl_timeout_seconds))
            .build()
            .map_err(|e| AppError::Comms(format!("crawler client: {e}")))?;
        let href = Regex::new(HREF_PATTERN)
            .map_err(|e| AppError::Config(format!("crawler link pattern: {e}")))?;
        let scope = scope_prefix(&root);
        Ok(Self {
            client,
            root,
            scope,
            max_depth: config.max_depth,
            max_pages: config.max_pages,
            href,
        })
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Absolute, fragment-free links of `html` that stay under the root.
    pub fn extract_links(&self, base: &Url, html: &str) -> Vec<Url> {
        let mut seen = HashSet::new();
        self.href
            .captures_iter(html)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
            .map(|m| m.as_str().trim())
            .filter(|href| !href.is_empty())
            .filter_map(|href| base.join(href).ok())
            .map(|mut url| {
                url.set_fragment(None);
                url
            })
            .filter(|url| self.in_scope(url))
            .filter(|url| seen.insert(url.as_str().to_string()))
            .collect()
    }

    fn in_scope(&self, url: &Url) -> bool {
        url.as_str().starts_with(&self.scope) || url.as_str() == self.scope.trim_end_matches('/')
    }

    /// Visible page text as Markdown; scripts and styles are skipped.
    pub fn to_markdown(&self, html: &str) -> Result<String, AppError> {
        HtmlToMarkdown::builder()
            .skip_tags(vec!["script", "style", "noscript"])
            .build()
            .convert(html)
            .map_err(|e| AppError::Comms(format!("html conversion failed: {e}")))
    }

    async fn fetch(&self, url: &Url) -> Result<Option<String>, AppError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::Comms(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Comms(format!("GET {url}: HTTP {status}")));
        }
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);
        if !is_html {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Comms(format!("GET {url}: {e}")))?;
        Ok(Some(body))
    }

    /// Crawl from the root and return every page that converted.
    pub async fn crawl(&self) -> Vec<Page> {
        let mut root = self.root.clone();
        root.set_fragment(None);

        let mut seen: HashSet<String> = HashSet::from([root.as_str().to_string()]);
        let mut queue: VecDeque<(Url, usize)> = VecDeque::from([(root, 0)]);
        let mut pages = Vec::new();

        while let Some((url, depth)) = queue.pop_front() {
            if depth >= self.max_depth {
                continue;
            }
            let html = match self.fetch(&url).await {
                Ok(Some(html)) => html,
                Ok(None) => {
                    debug!(%url, "skipping non-html page");
                    continue;
                }
                Err(e) => {
                    warn!(%url, error = %e, "page fetch failed");
                    continue;
                }
            };

            if depth + 1 < self.max_depth {
                for link in self.extract_links(&url, &html) {
                    if seen.len() >= self.max_pages {
                        break;
                    }
                    if seen.insert(link.as_str().to_string()) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }

            match self.to_markdown(&html) {
                Ok(markdown) if !markdown.trim().is_empty() => {
                    debug!(%url, depth, chars = markdown.len(), "page crawled");
                    pages.push(Page { url: url.to_string(), markdown });
                }
                Ok(_) => debug!(%url, "page has no visible text"),
                Err(e) => warn!(%url, error = %e, "page conversion failed"),
            }
        }

        info!(root = %self.root, pages = pages.len(), visited = seen.len(), "crawl finished");
        pages
    }
}

/// `root` without query or fragment, its path ending in `/`.
fn scope_prefix(root: &Url) -> String {
    let mut scope = root.clone();
    scope.set_query(None);
    scope.set_fragment(None);
    if !scope.path().ends_with('/') {
        let path = format!("{}/", scope.path());
        scope.set_path(&path);
    }
    scope.to_string()
}
