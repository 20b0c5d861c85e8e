use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{
    LookupIpStrategy, NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig,
    ResolverOpts,
};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::{Name, TokioAsyncResolver};
use tracing::{debug, info};

use crate::common::error::{Error, LookupError, Result};
use crate::config::types::DnsSettings;

use super::DnsResolver;

/// 系统 DNS 解析器（使用 tokio::net::lookup_host，只保留 IPv4）
pub struct SystemResolver;

#[async_trait]
impl DnsResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> std::result::Result<Vec<IpAddr>, LookupError> {
        let addrs: Vec<IpAddr> = tokio::net::lookup_host(format!("{}:0", host))
            .await
            .map_err(|e| classify_io(&e))?
            .map(|a| a.ip())
            .filter(IpAddr::is_ipv4)
            .collect();
        if addrs.is_empty() {
            return Err(LookupError::NoRecords);
        }
        debug!(host = host, count = addrs.len(), "system DNS resolved");
        Ok(addrs)
    }
}

/// getaddrinfo 只给出文本错误，按 EAI_NONAME / EAI_NODATA 的常见措辞归类
pub fn classify_io(err: &std::io::Error) -> LookupError {
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("name or service not known")
        || lower.contains("nodename nor servname")
        || lower.contains("no such host")
    {
        LookupError::NxDomain
    } else if lower.contains("no address associated") {
        LookupError::NoRecords
    } else if lower.contains("invalid input") || lower.contains("invalid socket address") {
        LookupError::InvalidName(msg)
    } else if lower.contains("temporary failure") {
        LookupError::ServerFailure(msg)
    } else {
        LookupError::Other(msg)
    }
}

/// 基于 hickory-resolver 的 DNS 解析器
pub struct HickoryResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryResolver {
    /// 使用系统配置（/etc/resolv.conf）
    pub fn from_system(settings: &DnsSettings) -> Result<Self> {
        let (config, opts) = hickory_resolver::system_conf::read_system_conf()
            .map_err(|e| Error::ResolverInit(e.to_string()))?;
        Ok(Self::with_config(config, tune(opts, settings), settings))
    }

    /// 使用指定的上游服务器
    pub fn with_nameservers(addresses: &[String], settings: &DnsSettings) -> Result<Self> {
        let mut group = NameServerConfigGroup::new();
        for address in addresses {
            group.merge(parse_nameserver(address)?);
        }
        let config = ResolverConfig::from_parts(None, vec![], group);
        let mut opts = ResolverOpts::default();
        opts.use_hosts_file = false;
        info!(servers = ?addresses, "using configured name servers");
        Ok(Self::with_config(config, tune(opts, settings), settings))
    }

    fn with_config(config: ResolverConfig, opts: ResolverOpts, settings: &DnsSettings) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout: settings.timeout,
        }
    }
}

/// 只查 A 记录，单次尝试
fn tune(mut opts: ResolverOpts, settings: &DnsSettings) -> ResolverOpts {
    opts.ip_strategy = LookupIpStrategy::Ipv4Only;
    opts.timeout = settings.timeout;
    opts.attempts = 1;
    opts.ndots = 0;
    opts
}

#[async_trait]
impl DnsResolver for HickoryResolver {
    async fn resolve(&self, host: &str) -> std::result::Result<Vec<IpAddr>, LookupError> {
        // 末尾加点，避免追加 search 域
        let fqdn = format!("{}.", host.trim_end_matches('.'));
        let name = Name::from_ascii(&fqdn).map_err(|e| LookupError::InvalidName(e.to_string()))?;
        let response = self
            .resolver
            .lookup_ip(name)
            .await
            .map_err(|e| classify(&e, self.timeout))?;
        let addrs: Vec<IpAddr> = response.iter().filter(IpAddr::is_ipv4).collect();
        if addrs.is_empty() {
            return Err(LookupError::NoRecords);
        }
        debug!(host = host, count = addrs.len(), "hickory DNS resolved");
        Ok(addrs)
    }
}

/// 把 hickory 的错误归类为 NXDOMAIN / 无记录 / 超时 / 服务器错误
pub fn classify(err: &ResolveError, timeout: Duration) -> LookupError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NXDomain => LookupError::NxDomain,
            ResponseCode::NoError => LookupError::NoRecords,
            code => LookupError::ServerFailure(code.to_string()),
        },
        ResolveErrorKind::Timeout => LookupError::Timeout(timeout),
        ResolveErrorKind::NoConnections
        | ResolveErrorKind::Io(_)
        | ResolveErrorKind::Proto(_) => LookupError::ServerFailure(err.to_string()),
        _ => LookupError::Other(err.to_string()),
    }
}

/// 根据配置构建底层解析器
pub fn build_resolver(settings: &DnsSettings) -> Result<Box<dyn DnsResolver>> {
    if settings.nameservers.is_empty() {
        match HickoryResolver::from_system(settings) {
            Ok(r) => {
                info!("using system name servers");
                Ok(Box::new(r))
            }
            Err(e) => {
                info!(error = %e, "system DNS config unavailable, falling back to getaddrinfo");
                Ok(Box::new(SystemResolver))
            }
        }
    } else {
        Ok(Box::new(HickoryResolver::with_nameservers(
            &settings.nameservers,
            settings,
        )?))
    }
}

/// 解析上游地址：`ip[:port]`、`tls://`、`https://`、`quic://`
pub fn parse_nameserver(address: &str) -> Result<NameServerConfigGroup> {
    let encrypted = |socket_addr: SocketAddr, protocol: Protocol, tls_name: Option<String>| {
        NameServerConfigGroup::from(vec![NameServerConfig {
            socket_addr,
            protocol,
            tls_dns_name: tls_name,
            trust_negative_responses: true,
            tls_config: None,
            bind_addr: None,
        }])
    };

    if let Some(rest) = address.strip_prefix("quic://") {
        let (ip, port) = parse_ip_port(rest, 853)?;
        Ok(encrypted(SocketAddr::new(ip, port), Protocol::Quic, Some(ip.to_string())))
    } else if let Some(rest) = address.strip_prefix("tls://") {
        let (ip, port) = parse_ip_port(rest, 853)?;
        Ok(encrypted(SocketAddr::new(ip, port), Protocol::Tls, Some(ip.to_string())))
    } else if address.starts_with("https://") {
        let parsed = reqwest::Url::parse(address)
            .map_err(|e| Error::validation(format!("invalid DoH URL '{}': {}", address, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::validation(format!("DoH URL missing host: {}", address)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = parsed.port().unwrap_or(443);
        let (ip, tls_name) = match host.parse::<IpAddr>() {
            Ok(ip) => (ip, None),
            Err(_) => (well_known_doh(&host)?, Some(host)),
        };
        Ok(encrypted(SocketAddr::new(ip, port), Protocol::Https, tls_name))
    } else {
        let (ip, port) = parse_ip_port(address, 53)?;
        Ok(NameServerConfigGroup::from_ips_clear(&[ip], port, true))
    }
}

/// DoH 主机名无法在没有 DNS 的情况下解析，只接受几个常见服务商
fn well_known_doh(host: &str) -> Result<IpAddr> {
    let ip = match host {
        "dns.google" | "dns.google.com" => [8, 8, 8, 8],
        "cloudflare-dns.com" | "one.one.one.one" => [1, 1, 1, 1],
        "dns.quad9.net" => [9, 9, 9, 9],
        _ => {
            return Err(Error::validation(format!(
                "DoH host '{}' is not a known provider; use an IP address instead",
                host
            )))
        }
    };
    Ok(IpAddr::from(ip))
}

/// 解析 "ip" 或 "ip:port" 或 "[ipv6]" 或 "[ipv6]:port" 格式
fn parse_ip_port(s: &str, default_port: u16) -> Result<(IpAddr, u16)> {
    if let Ok(ip) = s.parse::<IpAddr>() {
        return Ok((ip, default_port));
    }
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok((addr.ip(), addr.port()));
    }
    let stripped = s.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = stripped.parse::<IpAddr>() {
        return Ok((ip, default_port));
    }
    Err(Error::validation(format!("invalid name server address: {}", s)))
}
