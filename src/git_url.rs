use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// A decomposed remote URL. Accepts both absolute forms
/// (`ssh://git@host:2222/group/project.git`) and the scp-like shorthand
/// (`git@host:group/project.git`), which `url::Url` cannot represent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUrl {
    pub scheme: String,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

static SCP_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:([^@/]+)@)?([^:/@]+):(.+)$").expect("scp-like url regex"));

impl GitUrl {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() || input.contains('\\') {
            return None;
        }
        if input.contains("://") {
            let u = Url::parse(input).ok()?;
            let host = u.host_str()?.to_string();
            let user = (!u.username().is_empty()).then(|| u.username().to_string());
            return Some(Self {
                scheme: u.scheme().to_ascii_lowercase(),
                user,
                host,
                port: u.port(),
                path: u.path().trim_start_matches('/').to_string(),
            });
        }
        // Local paths are not remote URLs.
        if input.starts_with('/') || input.starts_with("./") || input.starts_with("../") {
            return None;
        }
        let caps = SCP_LIKE.captures(input)?;
        Some(Self {
            scheme: "ssh".into(),
            user: caps.get(1).map(|m| m.as_str().to_string()),
            host: caps[2].to_string(),
            port: None,
            path: caps[3].to_string(),
        })
    }

    pub fn is_ssh(&self) -> bool {
        self.scheme == "ssh"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scp_like() {
        let u = GitUrl::parse("git@github.com:rust-lang/git2-rs.git").unwrap();
        assert_eq!(u.scheme, "ssh");
        assert_eq!(u.user.as_deref(), Some("git"));
        assert_eq!(u.host, "github.com");
        assert_eq!(u.path, "rust-lang/git2-rs.git");
        assert!(u.is_ssh());
    }

    #[test]
    fn parses_scp_like_without_user() {
        let u = GitUrl::parse("example.org:repo.git").unwrap();
        assert_eq!(u.user, None);
        assert_eq!(u.host, "example.org");
    }

    #[test]
    fn parses_absolute_ssh_with_port() {
        let u = GitUrl::parse("ssh://git@example.com:2222/group/project.git").unwrap();
        assert!(u.is_ssh());
        assert_eq!(u.port, Some(2222));
        assert_eq!(u.path, "group/project.git");
    }

    #[test]
    fn parses_https() {
        let u = GitUrl::parse("https://github.com/rust-lang/git2-rs.git").unwrap();
        assert!(!u.is_ssh());
        assert_eq!(u.user, None);
        assert_eq!(u.host, "github.com");
    }

    #[test]
    fn rejects_local_paths() {
        assert!(GitUrl::parse("/srv/git/repo.git").is_none());
        assert!(GitUrl::parse("./repo").is_none());
        assert!(GitUrl::parse(r"C:\repos\thing").is_none());
        assert!(GitUrl::parse("").is_none());
    }
}
