use std::collections::VecDeque;

use git2::{Cred, CredentialType, Error as Git2Error, ErrorClass, ErrorCode};
use tracing::debug;

use super::candidate::Credential;

/// What to do when a `Default` candidate is popped for an SSH attempt.
///
/// Historically the default credential was silently upgraded to agent auth
/// when the URL carried the anonymous transport user (`git@...`); the exact
/// trigger varied between versions, so it is a policy here instead of a
/// hard-coded rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultCredentialPolicy {
    /// Substitute agent auth when the username presented for the attempt
    /// equals the given transport user.
    AgentForUser(String),
    /// Always hand the engine a true default credential.
    Never,
}

impl Default for DefaultCredentialPolicy {
    fn default() -> Self {
        DefaultCredentialPolicy::AgentForUser("git".into())
    }
}

/// The callback-facing credential state machine: Active while candidates
/// remain, Exhausted once the queue empties. Candidates are consumed
/// destructively, so no candidate is ever offered twice within one
/// operation regardless of how many rejection rounds the server issues.
pub struct CredentialCascade {
    queue: VecDeque<Credential>,
    policy: DefaultCredentialPolicy,
}

impl CredentialCascade {
    pub fn new(candidates: Vec<Credential>) -> Self {
        Self {
            queue: candidates.into(),
            policy: DefaultCredentialPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DefaultCredentialPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: DefaultCredentialPolicy) {
        self.policy = policy;
    }

    /// Prepend caller-supplied credentials ahead of everything discovered.
    pub fn prepend(&mut self, credentials: Vec<Credential>) {
        for cred in credentials.into_iter().rev() {
            self.queue.push_front(cred);
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Pop candidates until one is acceptable to the server mask. Popped
    /// candidates are gone for good, which bounds the cascade to the queue
    /// length.
    pub fn select(&mut self, allowed: CredentialType) -> Option<Credential> {
        while let Some(candidate) = self.queue.pop_front() {
            if candidate.allowed_by(allowed) {
                debug!(target: "auth", candidate = ?candidate, remaining = self.queue.len(), "offering credential");
                return Some(candidate);
            }
            debug!(target: "auth", candidate = ?candidate, "kind not in server mask, discarding");
        }
        None
    }

    /// Authentication-callback entry point: select the next usable
    /// candidate and translate it into an engine credential. Exhaustion is
    /// an `Auth` error; a translation failure (unreadable or corrupt key
    /// material) also fails the attempt and is not retried with the next
    /// candidate.
    pub fn resolve(
        &mut self,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> Result<Cred, Git2Error> {
        let Some(candidate) = self.select(allowed) else {
            return Err(Git2Error::new(
                ErrorCode::Auth,
                ErrorClass::Callback,
                "credential candidates exhausted",
            ));
        };
        self.translate(candidate, username_from_url)
    }

    fn translate(
        &self,
        candidate: Credential,
        username_from_url: Option<&str>,
    ) -> Result<Cred, Git2Error> {
        match candidate {
            Credential::Default => {
                if let DefaultCredentialPolicy::AgentForUser(anonymous) = &self.policy {
                    if username_from_url == Some(anonymous.as_str()) {
                        return Cred::ssh_key_from_agent(anonymous);
                    }
                }
                Cred::default()
            }
            Credential::Username(name) => Cred::username(&name),
            Credential::Plaintext { username, password } => {
                Cred::userpass_plaintext(&username, &password)
            }
            Credential::SshAgent => {
                let user = username_from_url.unwrap_or("git");
                Cred::ssh_key_from_agent(user)
            }
            Credential::SshKeyFile {
                username,
                public_key,
                private_key,
                passphrase,
            } => Cred::ssh_key(
                &username,
                Some(&public_key),
                &private_key,
                none_if_empty(&passphrase),
            ),
            Credential::SshKeyMemory {
                username,
                public_key,
                private_key,
                passphrase,
            } => Cred::ssh_key_from_memory(
                &username,
                Some(&public_key),
                &private_key,
                none_if_empty(&passphrase),
            ),
        }
    }
}

fn none_if_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
