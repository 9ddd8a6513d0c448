//! Intercepted requests and their routing category

use reqwest::Url;

use crate::cache::RequestKey;
use crate::config::ApiRoutes;

/// Routing category of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCategory {
    /// Page navigation / HTML document: network-first, root document fallback
    Navigation,
    /// Backend JSON endpoint: network-first, JSON offline payload fallback
    Api,
    /// Everything else: cache-first
    Static,
}

/// A request issued by a controlled page
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: Url,
    pub accept: Option<String>,
}

impl InterceptedRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url,
            accept: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.clone(), self.url.as_str())
    }

    /// Classify into exactly one category.
    ///
    /// API paths win over the Accept header. A missing Accept header never
    /// makes a request a navigation.
    pub fn category(&self, routes: &ApiRoutes) -> RequestCategory {
        if is_api_path(self.url.path(), routes) {
            return RequestCategory::Api;
        }

        let wants_html = self
            .accept
            .as_deref()
            .is_some_and(|accept| accept.contains("text/html"));
        if wants_html {
            RequestCategory::Navigation
        } else {
            RequestCategory::Static
        }
    }
}

/// Whether a path is routed through the API policy
pub fn is_api_path(path: &str, routes: &ApiRoutes) -> bool {
    if !routes.prefix.is_empty() && path.starts_with(&routes.prefix) {
        return true;
    }
    routes.paths.iter().any(|p| p == path)
}
