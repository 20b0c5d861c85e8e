//! 批量解析
//!
//! 每个域名一个任务，用信号量限制同时进行的查询数。每个查询有独立超时，
//! 一个域名失败或超时不会影响同一批次的其他域名。所有任务结束后才返回，
//! 调用方在这个汇合点之后单线程修改缓存。

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use ipnet::IpNet;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::common::error::{Error, LookupError, Result};
use crate::config::types::DnsSettings;

use super::DnsResolver;

/// 单个域名的解析结果：非空 IP 集合，或失败原因
pub type ResolutionResult = std::result::Result<BTreeSet<IpAddr>, LookupError>;

/// 每完成这么多个查询打一次进度日志
const PROGRESS_EVERY: usize = 1000;

pub struct Resolver {
    inner: Arc<dyn DnsResolver>,
    timeout: Duration,
    excluded: Arc<[IpNet]>,
}

impl Resolver {
    pub fn new(inner: Arc<dyn DnsResolver>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            excluded: Arc::from(Vec::new()),
        }
    }

    pub fn from_settings(inner: Arc<dyn DnsResolver>, settings: &DnsSettings) -> Self {
        Self::new(inner, settings.timeout).with_excluded(settings.excluded.clone())
    }

    /// 解析结果中需要剔除的地址段（如 0.0.0.0、127.0.0.1）
    pub fn with_excluded(mut self, excluded: Vec<IpNet>) -> Self {
        self.excluded = Arc::from(excluded);
        self
    }

    /// 并发解析一批域名，`concurrency` 为同时进行的查询上限。
    ///
    /// 返回的映射对每个输入域名恰好有一个结果；输入为空时不发起任何查询。
    pub async fn resolve_many<I>(
        &self,
        domains: I,
        concurrency: usize,
    ) -> Result<HashMap<String, ResolutionResult>>
    where
        I: IntoIterator<Item = String>,
    {
        if concurrency == 0 {
            return Err(Error::validation("concurrency must be at least 1"));
        }

        let mut seen = HashSet::new();
        let domains: Vec<String> = domains.into_iter().filter(|d| seen.insert(d.clone())).collect();
        if domains.is_empty() {
            return Ok(HashMap::new());
        }

        let total = domains.len();
        let started = Instant::now();
        info!(count = total, jobs = concurrency, "resolving domains");

        let semaphore = Arc::new(Semaphore::new(concurrency.min(Semaphore::MAX_PERMITS)));
        let mut pending = FuturesUnordered::new();
        for domain in domains {
            let permits = semaphore.clone();
            let inner = self.inner.clone();
            let excluded = self.excluded.clone();
            let timeout = self.timeout;
            let host = domain.clone();
            let handle = tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return Err(LookupError::Other("resolver shut down".to_string()));
                };
                lookup(inner.as_ref(), &host, timeout, &excluded).await
            });
            pending.push(async move { (domain, handle.await) });
        }

        let mut results = HashMap::with_capacity(total);
        let mut failed = 0usize;
        while let Some((domain, joined)) = pending.next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(LookupError::Other(format!("lookup task failed: {}", e)))
            });
            if let Err(e) = &result {
                failed += 1;
                debug!(domain = domain.as_str(), kind = e.as_str(), error = %e, "resolution failed");
            }
            results.insert(domain, result);
            if results.len() % PROGRESS_EVERY == 0 {
                debug!(done = results.len(), total = total, "resolution progress");
            }
        }

        info!(
            resolved = total - failed,
            failed = failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "resolution batch finished"
        );
        Ok(results)
    }
}

async fn lookup(
    resolver: &dyn DnsResolver,
    host: &str,
    timeout: Duration,
    excluded: &[IpNet],
) -> ResolutionResult {
    let addrs = match tokio::time::timeout(timeout, resolver.resolve(host)).await {
        Ok(result) => result?,
        Err(_) => return Err(LookupError::Timeout(timeout)),
    };
    if addrs.is_empty() {
        return Err(LookupError::NoRecords);
    }
    let ips: BTreeSet<IpAddr> = addrs
        .into_iter()
        .filter(|ip| !excluded.iter().any(|net| net.contains(ip)))
        .collect();
    if ips.is_empty() {
        return Err(LookupError::Filtered);
    }
    Ok(ips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 按域名返回固定结果，记录调用次数与最大并发
    struct ScriptedResolver {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedResolver {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl DnsResolver for ScriptedResolver {
        async fn resolve(&self, host: &str) -> std::result::Result<Vec<IpAddr>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match host {
                "missing.example" => Err(LookupError::NxDomain),
                "slow.example" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(vec!["10.0.0.1".parse().unwrap()])
                }
                "sinkhole.example" => Ok(vec!["0.0.0.0".parse().unwrap()]),
                "mixed.example" => Ok(vec![
                    "127.0.0.1".parse().unwrap(),
                    "203.0.113.7".parse().unwrap(),
                ]),
                _ => Ok(vec!["192.0.2.1".parse().unwrap(), "192.0.2.2".parse().unwrap()]),
            }
        }
    }

    fn excluded() -> Vec<IpNet> {
        crate::config::types::parse_excluded(["0.0.0.0", "127.0.0.1"]).unwrap()
    }

    #[tokio::test]
    async fn empty_batch_issues_no_lookups() {
        let inner = Arc::new(ScriptedResolver::new(Duration::ZERO));
        let resolver = Resolver::new(inner.clone(), Duration::from_secs(1));
        let results = resolver.resolve_many(Vec::new(), 4).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let inner = Arc::new(ScriptedResolver::new(Duration::ZERO));
        let resolver = Resolver::new(inner, Duration::from_secs(1));
        let err = resolver
            .resolve_many(vec!["a.example".to_string()], 0)
            .await
            .unwrap_err();
        assert!(err.kind().is_validation());
    }

    #[tokio::test]
    async fn failures_do_not_affect_other_domains() {
        let inner = Arc::new(ScriptedResolver::new(Duration::ZERO));
        let resolver = Resolver::new(inner, Duration::from_millis(200)).with_excluded(excluded());
        let domains = ["ok.example", "missing.example", "slow.example", "sinkhole.example", "mixed.example"]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();

        let results = resolver.resolve_many(domains, 8).await.unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results["ok.example"].as_ref().unwrap().len(), 2);
        assert_eq!(results["missing.example"], Err(LookupError::NxDomain));
        assert_eq!(
            results["slow.example"],
            Err(LookupError::Timeout(Duration::from_millis(200)))
        );
        assert_eq!(results["sinkhole.example"], Err(LookupError::Filtered));
        let mixed = results["mixed.example"].as_ref().unwrap();
        assert_eq!(mixed.len(), 1);
        assert!(mixed.contains(&"203.0.113.7".parse::<IpAddr>().unwrap()));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let inner = Arc::new(ScriptedResolver::new(Duration::from_millis(20)));
        let resolver = Resolver::new(inner.clone(), Duration::from_secs(5));
        let domains: Vec<String> = (0..40).map(|i| format!("host{}.example", i)).collect();

        let results = resolver.resolve_many(domains, 3).await.unwrap();
        assert_eq!(results.len(), 40);
        assert!(results.values().all(|r| r.is_ok()));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 40);
        assert!(inner.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn duplicate_inputs_resolved_once() {
        let inner = Arc::new(ScriptedResolver::new(Duration::ZERO));
        let resolver = Resolver::new(inner.clone(), Duration::from_secs(1));
        let domains = vec!["a.example".to_string(), "a.example".to_string()];
        let results = resolver.resolve_many(domains, 2).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
