use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::cache::Cache;
use crate::common::error::{Error, LookupError, Result};
use crate::dns::Resolver;

/// 部分刷新的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// 被抽中重新解析的域名数
    pub selected: usize,
    /// 成功刷新的域名数
    pub refreshed: usize,
    /// 刷新失败的域名，旧的 IP 集合保持不变
    pub failed: Vec<(String, LookupError)>,
}

/// 随机抽取一部分已缓存的域名重新解析，成功则原地覆盖
pub struct RefreshEngine<'a, R = ChaCha8Rng> {
    resolver: &'a Resolver,
    concurrency: usize,
    rng: R,
}

impl<'a> RefreshEngine<'a, ChaCha8Rng> {
    pub fn new(resolver: &'a Resolver, concurrency: usize) -> Self {
        Self::with_rng(resolver, concurrency, ChaCha8Rng::from_entropy())
    }

    /// 固定种子，测试中可复现抽样结果
    pub fn with_seed(resolver: &'a Resolver, concurrency: usize, seed: u64) -> Self {
        Self::with_rng(resolver, concurrency, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<'a, R: Rng> RefreshEngine<'a, R> {
    pub fn with_rng(resolver: &'a Resolver, concurrency: usize, rng: R) -> Self {
        Self {
            resolver,
            concurrency,
            rng,
        }
    }

    /// 重新解析 `ceil(percentage / 100 * n)` 个随机选中的域名（不放回抽样）
    pub async fn refresh(&mut self, cache: &mut Cache, percentage: u32) -> Result<RefreshReport> {
        let selected = self.select(cache, percentage)?;
        let mut report = RefreshReport {
            selected: selected.len(),
            ..Default::default()
        };
        if selected.is_empty() {
            info!(cached = cache.len(), "nothing selected for refresh");
            return Ok(report);
        }
        info!(
            selected = selected.len(),
            cached = cache.len(),
            percentage = percentage,
            "refreshing cached domains"
        );

        let mut results = self
            .resolver
            .resolve_many(selected.iter().cloned(), self.concurrency)
            .await?;

        for domain in selected {
            match results.remove(&domain) {
                Some(Ok(ips)) => {
                    cache.upsert(&domain, ips);
                    report.refreshed += 1;
                }
                Some(Err(e)) => report.failed.push((domain, e)),
                None => report
                    .failed
                    .push((domain, LookupError::Other("missing result".to_string()))),
            }
        }

        info!(
            refreshed = report.refreshed,
            failed = report.failed.len(),
            "refresh finished"
        );
        Ok(report)
    }

    /// 在调用时的缓存域名集合上均匀抽样，结果按缓存顺序排列
    pub fn select(&mut self, cache: &Cache, percentage: u32) -> Result<Vec<String>> {
        if percentage > 100 {
            return Err(Error::validation(format!(
                "refresh percentage must be between 0 and 100, got {}",
                percentage
            )));
        }
        let total = cache.len();
        let k = sample_size(total, percentage);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut picked = index::sample(&mut self.rng, total, k).into_vec();
        picked.sort_unstable();
        let records = cache.records();
        Ok(picked.into_iter().map(|i| records[i].domain.clone()).collect())
    }
}

/// `ceil(percentage * total / 100)`
pub fn sample_size(total: usize, percentage: u32) -> usize {
    (total * percentage as usize).div_ceil(100)
}
