//! 缓存持久化
//!
//! 文件格式：JSON `{"version": 1, "mappings": [{"domain": "a.com", "ips": ["1.2.3.4"]}]}`
//! `mappings` 为数组以保留顺序。写入时先写临时文件再重命名，崩溃不会破坏旧文件。

use std::collections::BTreeSet;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{normalize_domain, Cache, Upsert};
use crate::common::error::{Error, Result};

pub const CACHE_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheFile {
    version: u32,
    mappings: Vec<FileRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRecord {
    domain: String,
    ips: Vec<IpAddr>,
}

impl Cache {
    /// 从文件加载；文件不存在时返回空缓存
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no mappings file found, starting empty");
                return Ok(Cache::new());
            }
            Err(e) => return Err(Error::cache_load(path, e)),
        };

        let cache = parse(&content).map_err(|reason| Error::cache_load(path, reason))?;
        info!(path = %path.display(), count = cache.len(), "loaded mappings");
        Ok(cache)
    }

    /// 原子写入：`<path>.tmp` 写完后 rename 覆盖目标文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json().map_err(|e| Error::cache_save(path, e))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(dir = %parent.display(), "creating cache directory");
                std::fs::create_dir_all(parent).map_err(|e| Error::cache_save(path, e))?;
            }
        }

        let tmp_path = tmp_path_for(path);
        let write_tmp = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        };
        if let Err(e) = write_tmp() {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(Error::cache_save(path, format!("write tmp failed: {}", e)));
        }
        std::fs::rename(&tmp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            Error::cache_save(path, format!("rename failed: {}", e))
        })?;

        info!(path = %path.display(), count = self.len(), "saved mappings");
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let file = CacheFile {
            version: CACHE_FILE_VERSION,
            mappings: self
                .records
                .iter()
                .map(|r| FileRecord {
                    domain: r.domain.clone(),
                    ips: r.ips.iter().copied().collect(),
                })
                .collect(),
        };
        let mut json = serde_json::to_string_pretty(&file)?;
        json.push('\n');
        Ok(json)
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// 校验并构建缓存；损坏的内容直接报错，不做截断
fn parse(content: &str) -> std::result::Result<Cache, String> {
    let file: CacheFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
    if file.version != CACHE_FILE_VERSION {
        return Err(format!("unsupported cache version {}", file.version));
    }

    let mut cache = Cache::new();
    for (i, record) in file.mappings.into_iter().enumerate() {
        let domain = normalize_domain(&record.domain)
            .ok_or_else(|| format!("entry {} has an empty domain", i))?;
        if domain != record.domain {
            return Err(format!("entry {} domain '{}' is not normalized", i, record.domain));
        }
        let ips: BTreeSet<IpAddr> = record.ips.into_iter().collect();
        match cache.upsert(&domain, ips) {
            Upsert::Inserted => {}
            Upsert::Updated => return Err(format!("duplicate domain '{}'", domain)),
            Upsert::Ignored => return Err(format!("domain '{}' has no addresses", domain)),
        }
    }
    Ok(cache)
}
