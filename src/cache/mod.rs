//! 域名 → IP 映射缓存
//!
//! 有序映射：新域名追加到末尾，刷新时原地覆盖，保证多次运行的输出顺序稳定、便于 diff。

pub mod store;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::IpAddr;

/// 单个域名及其解析出的 IP 集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    pub domain: String,
    pub ips: BTreeSet<IpAddr>,
}

/// upsert 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    /// 空 IP 集合不入缓存
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cache {
    records: Vec<DomainRecord>,
    /// domain -> records 下标
    index: HashMap<String, usize>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新域名追加到末尾；已存在则原地覆盖 IP 集合，位置不变
    pub fn upsert(&mut self, domain: &str, ips: BTreeSet<IpAddr>) -> Upsert {
        if ips.is_empty() {
            return Upsert::Ignored;
        }
        if let Some(&pos) = self.index.get(domain) {
            self.records[pos].ips = ips;
            return Upsert::Updated;
        }
        self.index.insert(domain.to_string(), self.records.len());
        self.records.push(DomainRecord {
            domain: domain.to_string(),
            ips,
        });
        Upsert::Inserted
    }

    pub fn remove(&mut self, domain: &str) -> bool {
        let Some(pos) = self.index.remove(domain) else {
            return false;
        };
        self.records.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        true
    }

    /// 一次遍历删除多个域名，返回实际删除数量
    pub fn remove_many(&mut self, domains: &HashSet<String>) -> usize {
        if domains.is_empty() {
            return 0;
        }
        let before = self.records.len();
        self.records.retain(|r| !domains.contains(&r.domain));
        let removed = before - self.records.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    fn reindex(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.domain.clone(), i))
            .collect();
    }

    /// 按插入顺序的域名序列
    pub fn domains(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(|r| r.domain.as_str())
    }

    pub fn records(&self) -> &[DomainRecord] {
        &self.records
    }

    pub fn get(&self, domain: &str) -> Option<&BTreeSet<IpAddr>> {
        self.index.get(domain).map(|&pos| &self.records[pos].ips)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.index.contains_key(domain)
    }

    /// 所有 IP 去重，按首次出现的顺序
    pub fn ips(&self) -> Vec<IpAddr> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .flat_map(|r| r.ips.iter().copied())
            .filter(|ip| seen.insert(*ip))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Lowercase, trim and strip the trailing root dot. `None` for empty names.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ips(list: &[&str]) -> BTreeSet<IpAddr> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn upsert_appends_new_domains_in_order() {
        let mut cache = Cache::new();
        assert_eq!(cache.upsert("b.com", ips(&["1.1.1.1"])), Upsert::Inserted);
        assert_eq!(cache.upsert("a.com", ips(&["2.2.2.2"])), Upsert::Inserted);
        assert_eq!(cache.upsert("c.com", ips(&["3.3.3.3"])), Upsert::Inserted);
        assert_eq!(cache.domains().collect::<Vec<_>>(), vec!["b.com", "a.com", "c.com"]);
    }

    #[test]
    fn upsert_overwrites_in_place() {
        let mut cache = Cache::new();
        cache.upsert("a.com", ips(&["1.1.1.1"]));
        cache.upsert("b.com", ips(&["2.2.2.2"]));
        assert_eq!(cache.upsert("a.com", ips(&["9.9.9.9"])), Upsert::Updated);
        assert_eq!(cache.domains().collect::<Vec<_>>(), vec!["a.com", "b.com"]);
        assert_eq!(cache.get("a.com"), Some(&ips(&["9.9.9.9"])));
    }

    #[test]
    fn upsert_ignores_empty_sets() {
        let mut cache = Cache::new();
        assert_eq!(cache.upsert("a.com", BTreeSet::new()), Upsert::Ignored);
        assert!(cache.is_empty());
    }

    #[test]
    fn remove_keeps_remaining_order_and_index() {
        let mut cache = Cache::new();
        cache.upsert("a.com", ips(&["1.1.1.1"]));
        cache.upsert("b.com", ips(&["2.2.2.2"]));
        cache.upsert("c.com", ips(&["3.3.3.3"]));

        assert!(cache.remove("a.com"));
        assert!(!cache.remove("a.com"));
        assert_eq!(cache.domains().collect::<Vec<_>>(), vec!["b.com", "c.com"]);
        // 下标已经平移
        assert_eq!(cache.get("c.com"), Some(&ips(&["3.3.3.3"])));
        cache.upsert("c.com", ips(&["4.4.4.4"]));
        assert_eq!(cache.records()[1].ips, ips(&["4.4.4.4"]));
    }

    #[test]
    fn remove_many_single_pass() {
        let mut cache = Cache::new();
        for d in ["a.com", "b.com", "c.com", "d.com"] {
            cache.upsert(d, ips(&["1.1.1.1"]));
        }
        let stale: HashSet<String> = ["b.com", "d.com", "zzz.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(cache.remove_many(&stale), 2);
        assert_eq!(cache.domains().collect::<Vec<_>>(), vec!["a.com", "c.com"]);
        assert!(cache.contains("c.com"));
        assert!(!cache.contains("d.com"));
    }

    #[test]
    fn ips_are_unique_in_first_seen_order() {
        let mut cache = Cache::new();
        cache.upsert("a.com", ips(&["5.6.7.8", "1.2.3.4"]));
        cache.upsert("b.com", ips(&["1.2.3.4", "9.9.9.9"]));
        let all: Vec<String> = cache.ips().iter().map(|ip| ip.to_string()).collect();
        assert_eq!(all, vec!["1.2.3.4", "5.6.7.8", "9.9.9.9"]);
    }

    #[test]
    fn normalize() {
        assert_eq!(normalize_domain(" Example.COM. ").as_deref(), Some("example.com"));
        assert_eq!(normalize_domain("   "), None);
        assert_eq!(normalize_domain("."), None);
    }
}
