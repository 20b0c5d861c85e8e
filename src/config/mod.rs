#[cfg(feature = "cli")]
pub mod cli;
pub mod env;
pub mod types;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::common::error::{Error, Result};
use crate::dns::resolver::parse_nameserver;

pub use types::{Command, DnsSettings, FileConfig, LogLevel, OutputFormat, Overrides, Settings};

const MAPPINGS_ROOT_UNIX: &str = "/var/cache/dnscacher/mappings.json";
const MAPPINGS_UNIX: &str = "$HOME/.cache/dnscacher/mappings.json";
const MAPPINGS_WIN: &str = "%TEMP%\\dnscacher\\mappings.json";

/// Read the optional YAML config file. Env vars in the content are expanded first.
pub fn load_config_file(path: &str) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(Path::new(path))
        .map_err(|e| Error::validation(format!("cannot read config '{}': {}", path, e)))?;
    let content = env::expand_vars(&raw);
    serde_yml::from_str(&content)
        .map_err(|e| Error::validation(format!("invalid config '{}': {}", path, e)))
}

/// Default location of the mappings file for the current user.
pub fn default_mappings_path() -> &'static str {
    if cfg!(windows) {
        MAPPINGS_WIN
    } else if is_root() {
        MAPPINGS_ROOT_UNIX
    } else {
        MAPPINGS_UNIX
    }
}

#[cfg(target_os = "linux")]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(target_os = "linux"))]
fn is_root() -> bool {
    false
}

impl Settings {
    /// Merge CLI overrides over the config file over built-in defaults,
    /// validating everything before any I/O against the cache or network.
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let command = overrides
            .command
            .ok_or_else(|| Error::validation("no command given"))?;

        let source = if command.needs_source() && !overrides.debug {
            let source = overrides
                .source
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    Error::validation(format!(
                        "source is required for '{}' unless --debug is set",
                        command.as_str()
                    ))
                })?;
            Some(source)
        } else {
            None
        };

        let jobs = overrides.jobs.or(file.jobs).unwrap_or(types::DEFAULT_JOBS);
        if jobs == 0 {
            return Err(Error::validation("jobs must be at least 1"));
        }

        let timeout = overrides
            .timeout
            .or(file.timeout)
            .unwrap_or(types::DEFAULT_TIMEOUT_SECS);
        if timeout == 0 {
            return Err(Error::validation("timeout must be at least 1 second"));
        }

        let part = types::validate_part(overrides.part.or(file.part).unwrap_or(types::DEFAULT_PART))?;

        let ipset = overrides
            .ipset
            .or(file.ipset)
            .unwrap_or_else(|| types::DEFAULT_IPSET.to_string());
        if ipset.trim().is_empty() || ipset.contains(char::is_whitespace) {
            return Err(Error::validation(format!("invalid ipset name '{}'", ipset)));
        }

        let mappings = overrides
            .mappings
            .or(file.mappings)
            .unwrap_or_else(|| default_mappings_path().to_string());
        let mappings = PathBuf::from(env::expand_vars(&mappings));

        let log = overrides
            .log
            .or(file.log)
            .map(|p| PathBuf::from(env::expand_vars(&p)));

        let loglevel = match overrides.loglevel.or(file.loglevel) {
            Some(level) => level.parse()?,
            None => LogLevel::default(),
        };

        let output = overrides.output.unwrap_or(file.output);

        let nameservers = if overrides.nameservers.is_empty() {
            file.nameservers
        } else {
            overrides.nameservers
        };
        for address in &nameservers {
            parse_nameserver(address)?;
        }
        let excluded = match &file.excluded_ips {
            Some(list) => types::parse_excluded(list.iter().map(String::as_str))?,
            None => DnsSettings::default().excluded,
        };

        let settings = Settings {
            command,
            source,
            debug: overrides.debug,
            quiet: overrides.quiet,
            jobs,
            part,
            ipset,
            mappings,
            log,
            loglevel,
            output,
            dns: DnsSettings {
                nameservers,
                timeout: Duration::from_secs(timeout),
                excluded,
            },
        };
        debug!(settings = ?settings, "settings resolved");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(command: Command) -> Overrides {
        Overrides {
            command: Some(command),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply() {
        let settings = Settings::resolve(overrides(Command::Get), FileConfig::default()).unwrap();
        assert_eq!(settings.jobs, types::DEFAULT_JOBS);
        assert_eq!(settings.part, 100);
        assert_eq!(settings.ipset, "dnscacher");
        assert_eq!(settings.dns.timeout, Duration::from_secs(10));
        assert_eq!(settings.dns.excluded.len(), 2);
        assert!(settings.output.is_empty());
        assert!(settings.source.is_none());
    }

    #[test]
    fn add_requires_source_unless_debug() {
        let err = Settings::resolve(overrides(Command::Add), FileConfig::default()).unwrap_err();
        assert!(err.kind().is_validation());

        let mut o = overrides(Command::Update);
        o.debug = true;
        assert!(Settings::resolve(o, FileConfig::default()).is_ok());

        let mut o = overrides(Command::Add);
        o.source = Some("hosts.txt".into());
        let settings = Settings::resolve(o, FileConfig::default()).unwrap();
        assert_eq!(settings.source.as_deref(), Some("hosts.txt"));
    }

    #[test]
    fn cli_beats_file_beats_default() {
        let file = FileConfig {
            jobs: Some(32),
            timeout: Some(4),
            ipset: Some("blocked".into()),
            nameservers: vec!["1.1.1.1".into()],
            ..Default::default()
        };
        let mut o = overrides(Command::Refresh);
        o.jobs = Some(8);
        let settings = Settings::resolve(o, file).unwrap();
        assert_eq!(settings.jobs, 8);
        assert_eq!(settings.dns.timeout, Duration::from_secs(4));
        assert_eq!(settings.ipset, "blocked");
        assert_eq!(settings.dns.nameservers, vec!["1.1.1.1".to_string()]);
    }

    #[test]
    fn rejects_bad_values() {
        let mut o = overrides(Command::Refresh);
        o.part = Some(101);
        assert!(Settings::resolve(o, FileConfig::default()).is_err());

        let mut o = overrides(Command::Refresh);
        o.jobs = Some(0);
        assert!(Settings::resolve(o, FileConfig::default()).is_err());

        let mut o = overrides(Command::Get);
        o.loglevel = Some("chatty".into());
        assert!(Settings::resolve(o, FileConfig::default()).is_err());

        let mut o = overrides(Command::Get);
        o.ipset = Some("two words".into());
        assert!(Settings::resolve(o, FileConfig::default()).is_err());
    }

    #[test]
    fn malformed_nameserver_is_a_validation_error() {
        let mut o = overrides(Command::Add);
        o.source = Some("/nonexistent/hosts".into());
        o.nameservers = vec!["bogus".into()];
        let err = Settings::resolve(o, FileConfig::default()).unwrap_err();
        assert_eq!(err.kind(), crate::common::ErrorKind::Validation);

        let file = FileConfig {
            nameservers: vec!["1.1.1.1".into(), "tls://not-an-ip".into()],
            ..Default::default()
        };
        let err = Settings::resolve(overrides(Command::Refresh), file).unwrap_err();
        assert!(err.kind().is_validation());

        let mut o = overrides(Command::Refresh);
        o.nameservers = vec!["9.9.9.9:5353".into(), "https://dns.google/dns-query".into()];
        assert!(Settings::resolve(o, FileConfig::default()).is_ok());
    }

    #[test]
    fn load_config_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dnscacher.yaml");
        std::fs::write(&path, "jobs: 12\npart: 25\nipset: blocklist\n").unwrap();

        let file = load_config_file(path.to_str().unwrap()).unwrap();
        assert_eq!(file.jobs, Some(12));
        assert_eq!(file.part, Some(25));
        assert_eq!(file.ipset.as_deref(), Some("blocklist"));

        assert!(load_config_file(dir.path().join("missing.yaml").to_str().unwrap()).is_err());
    }
}
