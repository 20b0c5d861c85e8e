pub mod logging;

use std::sync::Arc;

use tracing::info;

use crate::cache::Cache;
use crate::common::error::{Error, Result};
use crate::config::{Command, Settings};
use crate::dns::{build_resolver, DnsResolver, Resolver};
use crate::output;
use crate::source::{self, SourceDomains};
use crate::sync::{log_failures, RefreshEngine, SyncEngine};

/// 一次命令行调用：加载缓存，按命令同步，保存，渲染输出
pub struct App {
    settings: Settings,
    resolver: Option<Arc<dyn DnsResolver>>,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            resolver: None,
        }
    }

    /// 替换底层解析器（默认按 `settings.dns` 构建）
    pub fn with_resolver(mut self, resolver: Arc<dyn DnsResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// 执行命令，返回要写到 stdout 的内容
    pub async fn run(&self) -> Result<String> {
        let path = self.settings.mappings.as_path();
        let mut cache = Cache::load(path)?;
        info!(
            command = self.settings.command.as_str(),
            path = %path.display(),
            cached = cache.len(),
            "cache loaded"
        );

        match self.settings.command {
            Command::Get => {}
            Command::Add | Command::Update => {
                let source = self.load_source().await?;
                let resolver = self.resolver()?;
                let engine = SyncEngine::new(&resolver, self.settings.jobs);
                let report = if self.settings.command == Command::Update {
                    engine.update(&mut cache, &source).await?
                } else {
                    engine.add(&mut cache, &source).await?
                };
                cache.save(path)?;
                log_failures("resolution", &report.failed);
                info!(
                    added = report.added.len(),
                    removed = report.removed.len(),
                    failed = report.failed.len(),
                    cached = cache.len(),
                    "{} finished",
                    self.settings.command.as_str()
                );
            }
            Command::Refresh => {
                let resolver = self.resolver()?;
                let report = RefreshEngine::new(&resolver, self.settings.jobs)
                    .refresh(&mut cache, u32::from(self.settings.part))
                    .await?;
                cache.save(path)?;
                log_failures("refresh", &report.failed);
                info!(
                    selected = report.selected,
                    refreshed = report.refreshed,
                    failed = report.failed.len(),
                    "refresh finished"
                );
            }
        }

        Ok(output::render_all(
            &cache,
            &self.settings.output,
            &self.settings.ipset,
        ))
    }

    async fn load_source(&self) -> Result<SourceDomains> {
        if self.settings.debug {
            info!("debug mode, using built-in domain list");
            return Ok(SourceDomains::debug_fixture());
        }
        let location = self
            .settings
            .source
            .as_deref()
            .ok_or_else(|| Error::validation("no source given"))?;
        source::fetch(location).await
    }

    fn resolver(&self) -> Result<Resolver> {
        let inner = match &self.resolver {
            Some(r) => r.clone(),
            None => Arc::from(build_resolver(&self.settings.dns)?),
        };
        Ok(Resolver::from_settings(inner, &self.settings.dns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileConfig, OutputFormat, Overrides};

    fn settings(command: Command, mappings: &std::path::Path) -> Settings {
        let overrides = Overrides {
            command: Some(command),
            mappings: Some(mappings.to_string_lossy().into_owned()),
            output: Some(vec![OutputFormat::Mappings]),
            ..Default::default()
        };
        Settings::resolve(overrides, FileConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn get_on_missing_cache_prints_nothing_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let out = App::new(settings(Command::Get, &path)).run().await.unwrap();
        assert!(out.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_cache_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        std::fs::write(&path, "not json").unwrap();
        let err = App::new(settings(Command::Get, &path)).run().await.unwrap_err();
        assert!(matches!(err, Error::CacheLoad { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }
}
