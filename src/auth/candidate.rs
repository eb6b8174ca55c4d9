use std::fmt;
use std::path::{Path, PathBuf};

use git2::CredentialType;
use tracing::debug;

use crate::git_url::GitUrl;
use crate::ssh::config::SshConfig;

/// One concrete authentication method and its parameters.
///
/// Key material and passwords are intentionally excluded from `Debug`
/// output so candidates can be logged while cascading.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Default,
    Username(String),
    Plaintext {
        username: String,
        password: String,
    },
    SshAgent,
    SshKeyFile {
        username: String,
        public_key: PathBuf,
        private_key: PathBuf,
        passphrase: String,
    },
    SshKeyMemory {
        username: String,
        public_key: String,
        private_key: String,
        passphrase: String,
    },
}

impl Credential {
    /// The authentication-kind bit this candidate occupies in the
    /// server-advertised mask. Agent auth shares the composite SSH-key
    /// kind, mirroring libgit2's `GIT_CREDENTIAL_SSH_*` grouping.
    pub fn kind(&self) -> CredentialType {
        match self {
            Credential::Default => CredentialType::DEFAULT,
            Credential::Username(_) => CredentialType::USERNAME,
            Credential::Plaintext { .. } => CredentialType::USER_PASS_PLAINTEXT,
            Credential::SshAgent => CredentialType::SSH_KEY | CredentialType::SSH_MEMORY,
            Credential::SshKeyFile { .. } => CredentialType::SSH_KEY,
            Credential::SshKeyMemory { .. } => CredentialType::SSH_MEMORY,
        }
    }

    /// A candidate is usable for an attempt iff the server mask and its
    /// kind intersect.
    pub fn allowed_by(&self, allowed: CredentialType) -> bool {
        allowed.intersects(self.kind())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Default => write!(f, "Default"),
            Credential::Username(u) => write!(f, "Username({u})"),
            Credential::Plaintext { username, .. } => {
                write!(f, "Plaintext(username: {username}, password: ***)")
            }
            Credential::SshAgent => write!(f, "SshAgent"),
            Credential::SshKeyFile {
                username,
                private_key,
                ..
            } => write!(
                f,
                "SshKeyFile(username: {username}, private_key: {})",
                private_key.display()
            ),
            Credential::SshKeyMemory { username, .. } => {
                write!(f, "SshKeyMemory(username: {username})")
            }
        }
    }
}

/// Conventional per-user key file names, tried in this order. Each name is
/// also probed with a `-cert` suffix.
pub const DEFAULT_KEY_NAMES: [&str; 5] = ["id_rsa", "id_dsa", "id_ecdsa", "id_ed25519", "id_xmss"];

/// Build the ordered candidate list for a remote URL (spec order: config
/// identity files, then discovered default key files, then agent, then
/// default; non-SSH remotes get only the default candidate). Explicit
/// caller credentials are prepended by [`crate::RemoteCallback`], not here.
pub fn discover(url: &GitUrl, config: &SshConfig, ssh_dir: &Path) -> Vec<Credential> {
    let mut out = Vec::new();
    if url.is_ssh() {
        if let Some(user) = url.user.as_deref() {
            let host_config = config.resolve(&url.host);
            for file in &host_config.identity_files {
                out.push(Credential::SshKeyFile {
                    username: user.to_string(),
                    public_key: with_pub_suffix(file),
                    private_key: file.clone(),
                    passphrase: String::new(),
                });
            }
            for name in DEFAULT_KEY_NAMES
                .iter()
                .flat_map(|n| [n.to_string(), format!("{n}-cert")])
            {
                let private_key = ssh_dir.join(&name);
                let public_key = with_pub_suffix(&private_key);
                if private_key.exists() && public_key.exists() {
                    out.push(Credential::SshKeyFile {
                        username: user.to_string(),
                        public_key,
                        private_key,
                        passphrase: String::new(),
                    });
                }
            }
            out.push(Credential::SshAgent);
            out.push(Credential::Default);
            debug!(target: "auth", host = %url.host, candidates = out.len(), "built ssh candidate list");
            return out;
        }
    }
    out.push(Credential::Default);
    out
}

fn with_pub_suffix(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".pub");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_single_mask_bits() {
        assert_eq!(Credential::Default.kind(), CredentialType::DEFAULT);
        assert_eq!(
            Credential::Username("u".into()).kind(),
            CredentialType::USERNAME
        );
        assert_eq!(
            Credential::Plaintext {
                username: "u".into(),
                password: "p".into()
            }
            .kind(),
            CredentialType::USER_PASS_PLAINTEXT
        );
        assert_eq!(
            Credential::SshAgent.kind(),
            CredentialType::SSH_KEY | CredentialType::SSH_MEMORY
        );
    }

    #[test]
    fn allowed_iff_mask_intersects() {
        let key = Credential::SshKeyFile {
            username: "git".into(),
            public_key: "/k.pub".into(),
            private_key: "/k".into(),
            passphrase: String::new(),
        };
        assert!(key.allowed_by(CredentialType::SSH_KEY));
        assert!(key.allowed_by(CredentialType::SSH_KEY | CredentialType::USER_PASS_PLAINTEXT));
        assert!(!key.allowed_by(CredentialType::USER_PASS_PLAINTEXT));
        // Agent rides the composite ssh-key kind.
        assert!(Credential::SshAgent.allowed_by(CredentialType::SSH_MEMORY));
        assert!(Credential::SshAgent.allowed_by(CredentialType::SSH_KEY));
    }

    #[test]
    fn non_ssh_url_gets_default_only() {
        let url = GitUrl::parse("https://github.com/a/b.git").unwrap();
        let list = discover(&url, &SshConfig::default(), Path::new("/nonexistent"));
        assert_eq!(list, vec![Credential::Default]);
    }

    #[test]
    fn ssh_url_without_user_gets_default_only() {
        let url = GitUrl::parse("ssh://example.com/a/b.git").unwrap();
        let list = discover(&url, &SshConfig::default(), Path::new("/nonexistent"));
        assert_eq!(list, vec![Credential::Default]);
    }

    #[test]
    fn ssh_url_terminates_with_agent_then_default() {
        let url = GitUrl::parse("git@example.com:a/b.git").unwrap();
        let list = discover(&url, &SshConfig::default(), Path::new("/nonexistent"));
        assert_eq!(list, vec![Credential::SshAgent, Credential::Default]);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let c = Credential::Plaintext {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let dbg = format!("{c:?}");
        assert!(dbg.contains("alice"));
        assert!(!dbg.contains("hunter2"));
    }
}
