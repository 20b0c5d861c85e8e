pub mod batch;
pub mod resolver;

use std::net::IpAddr;

use async_trait::async_trait;

use crate::common::error::LookupError;

pub use batch::{ResolutionResult, Resolver};
pub use resolver::{build_resolver, HickoryResolver, SystemResolver};

/// DNS 解析器 trait
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// 将域名解析为 IPv4 地址列表
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, LookupError>;
}
