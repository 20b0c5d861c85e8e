//! 把缓存渲染为 stdout 输出块
//!
//! - `mappings`：`domain ip1 ip2 ...`，每个域名一行
//! - `ips`：去重后的 IP，每行一个
//! - `domains`：域名，每行一个
//! - `ipset`：`add <name> <ip>`，可直接交给 `ipset restore`

use std::fmt::Write as _;

use crate::cache::Cache;
use crate::config::OutputFormat;

/// 渲染单个输出块，每行以换行结尾
pub fn render(cache: &Cache, format: OutputFormat, ipset: &str) -> String {
    let mut out = String::new();
    match format {
        OutputFormat::Mappings => {
            for record in cache.records() {
                out.push_str(&record.domain);
                for ip in &record.ips {
                    let _ = write!(out, " {}", ip);
                }
                out.push('\n');
            }
        }
        OutputFormat::Ips => {
            for ip in cache.ips() {
                let _ = writeln!(out, "{}", ip);
            }
        }
        OutputFormat::Domains => {
            for domain in cache.domains() {
                out.push_str(domain);
                out.push('\n');
            }
        }
        OutputFormat::Ipset => {
            for ip in cache.ips() {
                let _ = writeln!(out, "add {} {}", ipset, ip);
            }
        }
    }
    out
}

/// 按请求顺序拼接多个输出块
pub fn render_all(cache: &Cache, formats: &[OutputFormat], ipset: &str) -> String {
    formats
        .iter()
        .map(|format| render(cache, *format, ipset))
        .collect()
}
