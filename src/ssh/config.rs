use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use dirs_next as dirs;
use tracing::debug;

use super::pattern::matches_host;

/// Nested `Include`s deeper than this are dropped, matching the "malformed
/// includes are silently skipped" rule rather than recursing forever.
const MAX_INCLUDE_DEPTH: usize = 16;

/// One `Host` block: the patterns it applies to plus its directives.
/// Within a stanza a repeated scalar directive keeps the last value;
/// `identityfile` accumulates.
#[derive(Debug, Clone, Default)]
pub struct Stanza {
    pub patterns: Vec<String>,
    pub user: Option<String>,
    pub port: Option<String>,
    pub host_name: Option<String>,
    pub identity_files: Vec<PathBuf>,
}

impl Stanza {
    fn apply(&mut self, key: &str, values: &[String]) {
        let Some(param) = values.last() else { return };
        match key {
            "user" => self.user = Some(param.clone()),
            "port" => self.port = Some(param.clone()),
            "hostname" => self.host_name = Some(param.clone()),
            "identityfile" => self.identity_files.push(expand_tilde(param)),
            _ => debug!(target: "ssh_config", key, "ignoring unsupported directive"),
        }
    }
}

/// Per-host settings resolved by merging every matching stanza in file
/// order: first value seen wins for scalars, identity files are unioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConfig {
    pub user: Option<String>,
    pub port: Option<String>,
    pub host_name: Option<String>,
    pub identity_files: Vec<PathBuf>,
}

/// An SSH client configuration file (plus anything it `Include`s), parsed
/// into one ordered stanza list. Immutable after parsing.
#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    stanzas: Vec<Stanza>,
}

impl SshConfig {
    /// Parse a config file from disk. Returns `None` when the file cannot
    /// be read; parse errors inside the file never fail the whole load.
    pub fn parse_file(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).ok()?;
        let base = path.parent().map(Path::to_path_buf);
        let mut stanzas = Vec::new();
        parse_lines(&content, base.as_deref(), 0, &mut stanzas);
        debug!(target: "ssh_config", path = %path.display(), stanzas = stanzas.len(), "parsed ssh config");
        Some(Self { stanzas })
    }

    /// Parse from an in-memory string; relative includes resolve against
    /// `base` when given.
    pub fn parse_str(content: &str, base: Option<&Path>) -> Self {
        let mut stanzas = Vec::new();
        parse_lines(content, base, 0, &mut stanzas);
        Self { stanzas }
    }

    pub fn is_empty(&self) -> bool {
        self.stanzas.is_empty()
    }

    /// Merge every stanza matching `host`, in file order.
    pub fn resolve(&self, host: &str) -> HostConfig {
        let mut out = HostConfig::default();
        for stanza in self.stanzas.iter().filter(|s| matches_host(host, &s.patterns)) {
            if out.user.is_none() {
                out.user = stanza.user.clone();
            }
            if out.port.is_none() {
                out.port = stanza.port.clone();
            }
            if out.host_name.is_none() {
                out.host_name = stanza.host_name.clone();
            }
            for file in &stanza.identity_files {
                if !out.identity_files.contains(file) {
                    out.identity_files.push(file.clone());
                }
            }
        }
        out
    }
}

fn parse_lines(content: &str, base: Option<&Path>, depth: usize, stanzas: &mut Vec<Stanza>) {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens: Vec<String> = line
            .split(|c: char| c == '=' || c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if tokens.len() < 2 {
            continue;
        }
        let key = tokens.remove(0).to_ascii_lowercase();
        match key.as_str() {
            "host" => stanzas.push(Stanza {
                patterns: tokens,
                ..Stanza::default()
            }),
            "include" => {
                if depth >= MAX_INCLUDE_DEPTH {
                    debug!(target: "ssh_config", "include depth limit reached, skipping");
                    continue;
                }
                let target = expand_tilde(&tokens.join(" "));
                let target = match (target.is_relative(), base) {
                    (true, Some(dir)) => dir.join(target),
                    _ => target,
                };
                match fs::read_to_string(&target) {
                    Ok(included) => {
                        parse_lines(&included, target.parent(), depth + 1, stanzas)
                    }
                    Err(e) => {
                        debug!(target: "ssh_config", path = %target.display(), error = %e, "skipping unreadable include");
                    }
                }
            }
            _ => {
                // A directive before any Host stanza has nothing to attach to.
                if let Some(current) = stanzas.last_mut() {
                    current.apply(&key, &tokens);
                }
            }
        }
    }
}

pub fn expand_tilde(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

static USER_CONFIG: OnceLock<SshConfig> = OnceLock::new();

/// The user's `~/.ssh/config`, parsed once per process and treated as
/// read-only thereafter.
pub fn user_config() -> &'static SshConfig {
    USER_CONFIG.get_or_init(|| {
        dirs::home_dir()
            .map(|home| home.join(".ssh").join("config"))
            .and_then(SshConfig::parse_file)
            .unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_blank_lines_and_orphan_directives() {
        let cfg = SshConfig::parse_str(
            "# global comment\n\nUser nobody\nHost example.com\n  User alice\n",
            None,
        );
        let resolved = cfg.resolve("example.com");
        assert_eq!(resolved.user.as_deref(), Some("alice"));
    }

    #[test]
    fn tokenizes_on_equals_whitespace_and_comma() {
        let cfg = SshConfig::parse_str(
            "Host a.com,b.com\nUser=carol\nPort 2022\n",
            None,
        );
        assert_eq!(cfg.resolve("b.com").user.as_deref(), Some("carol"));
        assert_eq!(cfg.resolve("a.com").port.as_deref(), Some("2022"));
    }

    #[test]
    fn scalar_merge_is_first_seen_wins() {
        let cfg = SshConfig::parse_str(
            "Host *.example.com\n  User first\n  Port 22\nHost dev.example.com\n  User second\n  HostName internal.example.com\n",
            None,
        );
        let resolved = cfg.resolve("dev.example.com");
        assert_eq!(resolved.user.as_deref(), Some("first"));
        assert_eq!(resolved.port.as_deref(), Some("22"));
        // Only the later stanza sets HostName, so it still lands.
        assert_eq!(resolved.host_name.as_deref(), Some("internal.example.com"));
    }

    #[test]
    fn identity_files_are_unioned_and_deduplicated() {
        let cfg = SshConfig::parse_str(
            "Host *.example.com\n  IdentityFile /keys/a\nHost dev.example.com\n  IdentityFile /keys/b\n  IdentityFile /keys/a\n",
            None,
        );
        let resolved = cfg.resolve("dev.example.com");
        assert_eq!(
            resolved.identity_files,
            vec![PathBuf::from("/keys/a"), PathBuf::from("/keys/b")]
        );
    }

    #[test]
    fn multiple_identity_files_in_one_stanza() {
        let cfg = SshConfig::parse_str(
            "Host work\n  IdentityFile /keys/work\n  IdentityFile /keys/backup\n",
            None,
        );
        assert_eq!(cfg.resolve("work").identity_files.len(), 2);
    }

    #[test]
    fn non_matching_host_resolves_empty() {
        let cfg = SshConfig::parse_str("Host example.com\n  User alice\n", None);
        assert_eq!(cfg.resolve("other.com"), HostConfig::default());
    }

    #[test]
    fn missing_include_is_skipped() {
        let cfg = SshConfig::parse_str(
            "Include /definitely/not/here\nHost example.com\n  User alice\n",
            None,
        );
        assert_eq!(cfg.resolve("example.com").user.as_deref(), Some("alice"));
    }
}
