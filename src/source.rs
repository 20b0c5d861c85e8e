//! 域名源：本地文件、URL 或调试用的固定列表
//!
//! 支持 hosts 格式（`0.0.0.0 ads.example.com`）和每行一个域名的纯文本，
//! `#` 开头为注释。

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::normalize_domain;
use crate::common::error::{Error, Result};

/// `--debug` 时替代真实源的固定域名
pub const DEBUG_DOMAINS: &[&str] = &["example.com", "example.org"];

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// hosts 文件里常见但不应解析的名字
const IGNORED_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "0.0.0.0",
];

/// 源域名集合，保留首次出现的顺序
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceDomains {
    order: Vec<String>,
    set: HashSet<String>,
}

impl SourceDomains {
    pub fn insert(&mut self, raw: &str) -> bool {
        let Some(domain) = normalize_domain(raw) else {
            return false;
        };
        if IGNORED_NAMES.contains(&domain.as_str()) || domain.parse::<IpAddr>().is_ok() {
            return false;
        }
        if !self.set.insert(domain.clone()) {
            return false;
        }
        self.order.push(domain);
        true
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.set.contains(domain)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 解析 hosts 格式或纯文本域名列表
    pub fn parse(content: &str) -> Self {
        let mut domains = Self::default();
        for line in content.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            };
            let mut fields = line.split_whitespace();
            let Some(first) = fields.next() else {
                continue;
            };
            if first.parse::<IpAddr>().is_ok() {
                for name in fields {
                    domains.insert(name);
                }
            } else {
                domains.insert(first);
            }
        }
        domains
    }

    pub fn debug_fixture() -> Self {
        DEBUG_DOMAINS.iter().copied().collect()
    }
}

impl<'a> FromIterator<&'a str> for SourceDomains {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut domains = Self::default();
        for d in iter {
            domains.insert(d);
        }
        domains
    }
}

/// 从 URL 或文件读取域名源
pub async fn fetch(source: &str) -> Result<SourceDomains> {
    let content = if source.starts_with("http://") || source.starts_with("https://") {
        download(source).await?
    } else {
        tokio::fs::read_to_string(Path::new(source))
            .await
            .map_err(|e| Error::source_fetch(source, e))?
    };

    let domains = SourceDomains::parse(&content);
    info!(source = source, count = domains.len(), "source domains loaded");
    Ok(domains)
}

async fn download(url: &str) -> Result<String> {
    debug!(url = url, "downloading domain list");
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| Error::source_fetch(url, e))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::source_fetch(url, e))?;
    if !response.status().is_success() {
        return Err(Error::source_fetch(url, format!("HTTP {}", response.status())));
    }
    response
        .text()
        .await
        .map_err(|e| Error::source_fetch(url, format!("failed to read response body: {}", e)))
}
