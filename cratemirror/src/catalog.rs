// This file is dual licensed under the terms of the Apache License, Version
// 2.0, and the BSD License. See the LICENSE file in the root of this repository
// for complete details.

//! Clients for the two upstream HTTP surfaces this crate talks to: the
//! crates.io-shaped top-crates catalog endpoint (used by the seed builder)
//! and the plain archive download endpoint (used by the fetcher).
//!
//! Both are traits so the seed builder and fetcher can be exercised against
//! an in-memory fake without a network round trip — grounded on
//! `repository.rs`'s use of `reqwest::blocking::Client`, generalized behind
//! a seam.

use std::time::SystemTime;

use log::info;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const LOGNAME: &str = "cratemirror::catalog";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("could not parse catalog response")]
    Deserialize(#[from] serde_json::Error),
}

#[derive(Deserialize, Debug, Clone)]
pub struct CatalogCrate {
    pub name: String,
    pub max_version: String,
    pub max_stable_version: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CatalogPage {
    pub crates: Vec<CatalogCrate>,
}

/// The top-crates catalog endpoint (§6 "Upstream catalog API"): paginated,
/// sorted by download count descending, optionally scoped to a category.
pub trait CatalogClient {
    fn top(
        &self,
        per_page: u32,
        page: u32,
        category: Option<&str>,
    ) -> Result<CatalogPage, CatalogError>;

    fn fetch_text(&self, url: &Url) -> Result<String, CatalogError>;
}

pub struct HttpCatalogClient {
    client: HttpClient,
    base: Url,
}

impl HttpCatalogClient {
    pub fn new(base: Url) -> Result<HttpCatalogClient, CatalogError> {
        let client = HttpClient::builder().gzip(true).build()?;
        Ok(HttpCatalogClient { client, base })
    }
}

impl CatalogClient for HttpCatalogClient {
    fn top(
        &self,
        per_page: u32,
        page: u32,
        category: Option<&str>,
    ) -> Result<CatalogPage, CatalogError> {
        let mut url = self.base.clone();
        {
            let mut qs = url.query_pairs_mut();
            qs.append_pair("page", &page.to_string());
            qs.append_pair("per_page", &per_page.to_string());
            qs.append_pair("sort", "downloads");
            if let Some(category) = category {
                qs.append_pair("category", category);
            }
        }

        info!(target: LOGNAME, "fetching catalog page {page} (per_page={per_page}, category={category:?})");
        let page: CatalogPage = self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(page)
    }

    fn fetch_text(&self, url: &Url) -> Result<String, CatalogError> {
        info!(target: LOGNAME, "fetching {url}");
        let text = self.client.get(url.clone()).send()?.error_for_status()?.text()?;
        Ok(text)
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {status}")]
    BadStatus { status: u16 },
}

pub struct ArchiveResponse {
    pub body: Vec<u8>,
    pub last_modified: Option<SystemTime>,
}

/// The plain archive download endpoint (§5 / §4.H). Narrower than
/// `CatalogClient` so `fetcher.rs` can be tested against an in-memory fake
/// without dragging in JSON parsing concerns.
pub trait ArchiveClient: Send + Sync {
    fn get(&self, url: &Url) -> Result<ArchiveResponse, ArchiveError>;
}

pub struct HttpArchiveClient {
    client: HttpClient,
}

impl HttpArchiveClient {
    pub fn new() -> Result<HttpArchiveClient, ArchiveError> {
        let client = HttpClient::builder().gzip(true).build()?;
        Ok(HttpArchiveClient { client })
    }
}

impl ArchiveClient for HttpArchiveClient {
    fn get(&self, url: &Url) -> Result<ArchiveResponse, ArchiveError> {
        let response = self.client.get(url.clone()).send()?;
        if !response.status().is_success() {
            return Err(ArchiveError::BadStatus {
                status: response.status().as_u16(),
            });
        }

        let last_modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| httpdate::parse_http_date(v).ok());

        let body = response.bytes()?.to_vec();
        Ok(ArchiveResponse { body, last_modified })
    }
}
