//! 缓存与域名源的同步
//!
//! add：只解析源中有、缓存中没有的域名；update：add 之后删除源中已不存在的域名。
//! 解析失败的域名不会进入缓存，下次运行时仍然是“新域名”，会被自动重试。

pub mod refresh;

use std::collections::HashSet;

use tracing::{info, warn};

use crate::cache::{Cache, Upsert};
use crate::common::error::{LookupError, Result};
use crate::dns::Resolver;
use crate::source::SourceDomains;

pub use refresh::{RefreshEngine, RefreshReport};

/// add / update 的结果汇总
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// 新加入缓存的域名，按源中顺序
    pub added: Vec<String>,
    /// 解析失败的域名及原因，按源中顺序
    pub failed: Vec<(String, LookupError)>,
    /// update 删除的过期域名，按缓存中原有顺序
    pub removed: Vec<String>,
}

impl SyncReport {
    pub fn failed_domains(&self) -> impl Iterator<Item = &str> + '_ {
        self.failed.iter().map(|(d, _)| d.as_str())
    }
}

pub struct SyncEngine<'a> {
    resolver: &'a Resolver,
    concurrency: usize,
}

impl<'a> SyncEngine<'a> {
    pub fn new(resolver: &'a Resolver, concurrency: usize) -> Self {
        Self {
            resolver,
            concurrency,
        }
    }

    /// 解析并加入源中尚未缓存的域名，从不删除已有条目
    pub async fn add(&self, cache: &mut Cache, source: &SourceDomains) -> Result<SyncReport> {
        let new_domains: Vec<String> = source
            .iter()
            .filter(|d| !cache.contains(d))
            .map(str::to_string)
            .collect();
        let mut report = SyncReport::default();
        if new_domains.is_empty() {
            info!(cached = cache.len(), "no new domains to resolve");
            return Ok(report);
        }
        info!(new = new_domains.len(), cached = cache.len(), "new domains to resolve");

        let mut results = self
            .resolver
            .resolve_many(new_domains.iter().cloned(), self.concurrency)
            .await?;

        // 汇合点之后按源中顺序写入缓存，保证顺序与解析完成顺序无关
        for domain in new_domains {
            match results.remove(&domain) {
                Some(Ok(ips)) => {
                    if cache.upsert(&domain, ips) == Upsert::Inserted {
                        report.added.push(domain);
                    }
                }
                Some(Err(e)) => report.failed.push((domain, e)),
                None => report
                    .failed
                    .push((domain, LookupError::Other("missing result".to_string()))),
            }
        }

        info!(
            added = report.added.len(),
            failed = report.failed.len(),
            "new domains merged"
        );
        Ok(report)
    }

    /// add 之后删除缓存中有、源中没有的域名（不再解析确认）
    pub async fn update(&self, cache: &mut Cache, source: &SourceDomains) -> Result<SyncReport> {
        let mut report = self.add(cache, source).await?;

        report.removed = cache
            .domains()
            .filter(|d| !source.contains(d))
            .map(str::to_string)
            .collect();
        if !report.removed.is_empty() {
            let stale: HashSet<String> = report.removed.iter().cloned().collect();
            let removed = cache.remove_many(&stale);
            info!(removed = removed, remaining = cache.len(), "stale domains removed");
        }
        Ok(report)
    }
}

/// 汇总失败的域名，供驱动层打印
pub fn log_failures(what: &str, failed: &[(String, LookupError)]) {
    if failed.is_empty() {
        return;
    }
    let transient = failed.iter().filter(|(_, e)| e.is_transient()).count();
    warn!(
        count = failed.len(),
        transient = transient,
        "{} failed for some domains",
        what
    );
    for (domain, err) in failed {
        info!(domain = domain.as_str(), kind = err.as_str(), error = %err, "{} failed", what);
    }
}
