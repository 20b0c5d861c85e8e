//! 命令行定义（clap derive）

use clap::{Parser, Subcommand};

use super::types::{Command, OutputFormat, Overrides};

const ABOUT: &str = "\
Resolve the IP addresses of the SOURCE domains and store the domain to IP
mappings in a local cache.

Running again only resolves domains that are in SOURCE but not yet cached.
`update` also drops cached domains that are no longer in SOURCE, and
`refresh` re-resolves a random --part of the cache. Nothing is written to
stdout unless --output is given.";

#[derive(Debug, Parser)]
#[command(name = "dnscacher", version, about = ABOUT)]
pub struct Cli {
    /// Write the cached data to stdout, comma separated
    #[arg(short, long, value_enum, value_delimiter = ',', global = true)]
    pub output: Option<Vec<OutputFormat>>,

    /// Number of lookups to run in parallel
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,

    /// Percentage (0-100) of the cached mappings to re-resolve
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub part: Option<u8>,

    /// Timeout in seconds for resolving a single domain
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Path to the domain to IP mappings file
    #[arg(short, long, global = true)]
    pub mappings: Option<String>,

    /// Name of the ipset used by the `ipset` output
    #[arg(short, long, global = true)]
    pub ipset: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, global = true)]
    pub loglevel: Option<String>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log: Option<String>,

    /// Do not log to stderr
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use a fixed local domain list instead of SOURCE
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// YAML file with default settings
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Upstream name server (ip[:port], tls://, https://, quic://); repeatable
    #[arg(short, long = "nameserver", global = true)]
    pub nameservers: Vec<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Only print the mappings currently stored in the cache
    Get,
    /// Resolve and add the SOURCE domains that are not cached yet
    Add {
        /// URL or file path with the domains; ignored with --debug
        source: Option<String>,
    },
    /// Like add, then drop cached domains that are no longer in SOURCE
    Update {
        /// URL or file path with the domains; ignored with --debug
        source: Option<String>,
    },
    /// Re-resolve a random --part of the cached domains
    Refresh,
}

impl Cli {
    pub fn into_overrides(self) -> Overrides {
        let (command, source) = match self.command {
            CliCommand::Get => (Command::Get, None),
            CliCommand::Add { source } => (Command::Add, source),
            CliCommand::Update { source } => (Command::Update, source),
            CliCommand::Refresh => (Command::Refresh, None),
        };
        Overrides {
            command: Some(command),
            source,
            debug: self.debug,
            quiet: self.quiet,
            jobs: self.jobs.map(|j| usize::try_from(j).unwrap_or(usize::MAX)),
            timeout: self.timeout,
            part: self.part,
            ipset: self.ipset,
            mappings: self.mappings,
            log: self.log,
            loglevel: self.loglevel,
            output: self.output,
            nameservers: self.nameservers,
            config: self.config,
        }
    }
}
