use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ipnet::IpNet;
use serde::Deserialize;

use crate::common::error::{Error, Result};

pub const DEFAULT_JOBS: usize = 10_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PART: u8 = 100;
pub const DEFAULT_IPSET: &str = "dnscacher";
pub const DEFAULT_EXCLUDED_IPS: &[&str] = &["0.0.0.0", "127.0.0.1"];

/// Output blocks that can be written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mappings,
    Ips,
    Domains,
    Ipset,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Mappings => "mappings",
            OutputFormat::Ips => "ips",
            OutputFormat::Domains => "domains",
            OutputFormat::Ipset => "ipset",
        }
    }

    /// Parse a comma-separated list such as `mappings,ipset`.
    pub fn parse_list(value: &str) -> Result<Vec<Self>> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mappings" => Ok(OutputFormat::Mappings),
            "ips" => Ok(OutputFormat::Ips),
            "domains" => Ok(OutputFormat::Domains),
            "ipset" => Ok(OutputFormat::Ipset),
            other => Err(Error::validation(format!(
                "unknown output '{}', expected one of: mappings, ips, domains, ipset",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 只读：从缓存输出
    Get,
    /// 解析源中新增的域名
    Add,
    /// add + 删除源中已不存在的域名
    Update,
    /// 随机重新解析一部分已缓存的域名
    Refresh,
}

impl Command {
    pub fn needs_source(self) -> bool {
        matches!(self, Command::Add | Command::Update)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Get => "get",
            Command::Add => "add",
            Command::Update => "update",
            Command::Refresh => "refresh",
        }
    }
}

/// Optional YAML config file (`--config`). Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub jobs: Option<usize>,
    pub timeout: Option<u64>,
    pub part: Option<u8>,
    pub ipset: Option<String>,
    pub mappings: Option<String>,
    pub log: Option<String>,
    pub loglevel: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputFormat>,
    #[serde(default)]
    pub nameservers: Vec<String>,
    pub excluded_ips: Option<Vec<String>>,
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub command: Option<Command>,
    pub source: Option<String>,
    pub debug: bool,
    pub quiet: bool,
    pub jobs: Option<usize>,
    pub timeout: Option<u64>,
    pub part: Option<u8>,
    pub ipset: Option<String>,
    pub mappings: Option<String>,
    pub log: Option<String>,
    pub loglevel: Option<String>,
    pub output: Option<Vec<OutputFormat>>,
    pub nameservers: Vec<String>,
    pub config: Option<String>,
}

/// Resolver tuning shared by every lookup of a command.
#[derive(Debug, Clone)]
pub struct DnsSettings {
    /// 空表示使用系统配置
    pub nameservers: Vec<String>,
    pub timeout: Duration,
    pub excluded: Vec<IpNet>,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            nameservers: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            excluded: parse_excluded(DEFAULT_EXCLUDED_IPS.iter().copied())
                .unwrap_or_default(),
        }
    }
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub command: Command,
    pub source: Option<String>,
    pub debug: bool,
    pub quiet: bool,
    pub jobs: usize,
    pub part: u8,
    pub ipset: String,
    pub mappings: PathBuf,
    pub log: Option<PathBuf>,
    pub loglevel: LogLevel,
    pub output: Vec<OutputFormat>,
    pub dns: DnsSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" | "critical" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(Error::validation(format!("unknown log level '{}'", other))),
        }
    }
}

/// 解析排除的 IP / CIDR 列表（单个 IP 视为 /32 或 /128）
pub fn parse_excluded<'a>(items: impl IntoIterator<Item = &'a str>) -> Result<Vec<IpNet>> {
    items
        .into_iter()
        .map(|s| {
            let s = s.trim();
            if let Ok(net) = s.parse::<IpNet>() {
                return Ok(net);
            }
            s.parse::<std::net::IpAddr>()
                .map(IpNet::from)
                .map_err(|_| Error::validation(format!("invalid excluded address '{}'", s)))
        })
        .collect()
}

pub fn validate_part(part: u8) -> Result<u8> {
    if part > 100 {
        return Err(Error::validation(format!(
            "part must be between 0 and 100, got {}",
            part
        )));
    }
    Ok(part)
}
