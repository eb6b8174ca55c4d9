use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dirs_next as dirs;
use git2::{ErrorClass, ErrorCode, RemoteCallbacks};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::auth::candidate::{self, Credential};
use crate::auth::cascade::{CredentialCascade, DefaultCredentialPolicy};
use crate::git_url::GitUrl;
use crate::progress::refs;
use crate::progress::transfer::{TransferReporter, TransferSnapshot};
use crate::ssh::config as ssh_config;

/// Text sink for rendered status lines, in emission order.
pub type MessageFn = Box<dyn FnMut(&str) + Send>;
/// Structured sink for raw counters, invoked on every tick, unthrottled.
pub type ProgressFn = Box<dyn FnMut(&TransferSnapshot) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Fetch,
    Pull,
    Clone,
    Push,
}

/// Mutable per-operation state shared into the engine's closures. The
/// engine drives all callbacks for one operation sequentially, so the
/// mutex is uncontended; it only satisfies the `'static` closure bounds.
struct Shared {
    cascade: CredentialCascade,
    reporter: TransferReporter,
    message: Option<MessageFn>,
    progress: Option<ProgressFn>,
    negotiation_rejected: bool,
}

/// The orchestrating object for one network operation: owns the credential
/// cascade, the progress reporter, and the caller's sinks, and wires all of
/// them into a `git2::RemoteCallbacks` set.
///
/// One instance per operation; concurrent operations each need their own.
pub struct RemoteCallback {
    mode: Mode,
    url: Option<GitUrl>,
    shared: Arc<Mutex<Shared>>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl RemoteCallback {
    /// Build an orchestrator for `url`, discovering SSH credential
    /// candidates from the user's SSH configuration and key directory.
    pub fn new(mode: Mode, url: &str) -> Self {
        let parsed = GitUrl::parse(url);
        let candidates = match (&parsed, dirs::home_dir()) {
            (Some(u), Some(home)) => {
                candidate::discover(u, ssh_config::user_config(), &home.join(".ssh"))
            }
            _ => vec![Credential::Default],
        };
        Self::with_candidates(mode, parsed, candidates)
    }

    /// Build from a pre-computed candidate list, bypassing on-disk
    /// discovery. Useful for hosts embedding their own credential store.
    pub fn with_candidates(
        mode: Mode,
        url: Option<GitUrl>,
        candidates: Vec<Credential>,
    ) -> Self {
        debug!(target: "auth", ?mode, candidates = candidates.len(), "remote callback created");
        Self {
            mode,
            url,
            shared: Arc::new(Mutex::new(Shared {
                cascade: CredentialCascade::new(candidates),
                reporter: TransferReporter::new(),
                message: None,
                progress: None,
                negotiation_rejected: false,
            })),
            interrupt: None,
        }
    }

    /// Prepend explicit credentials; they are tried before anything
    /// discovered from SSH configuration.
    pub fn with_credentials(self, credentials: Vec<Credential>) -> Self {
        if let Ok(mut s) = self.shared.lock() {
            s.cascade.prepend(credentials);
        }
        self
    }

    pub fn with_default_policy(self, policy: DefaultCredentialPolicy) -> Self {
        if let Ok(mut s) = self.shared.lock() {
            s.cascade.set_policy(policy);
        }
        self
    }

    /// Receive every rendered text line, suitable for streaming to a
    /// console.
    pub fn on_message(self, f: impl FnMut(&str) + Send + 'static) -> Self {
        if let Ok(mut s) = self.shared.lock() {
            s.message = Some(Box::new(f));
        }
        self
    }

    /// Receive the raw counter snapshot on every tick.
    pub fn on_progress(self, f: impl FnMut(&TransferSnapshot) + Send + 'static) -> Self {
        if let Ok(mut s) = self.shared.lock() {
            s.progress = Some(Box::new(f));
        }
        self
    }

    /// Cooperative cancellation: when the flag is set, the next progress
    /// callback returns a negative status and the engine aborts the
    /// operation.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn url(&self) -> Option<&GitUrl> {
        self.url.as_ref()
    }

    pub fn remaining_candidates(&self) -> usize {
        self.shared.lock().map(|s| s.cascade.remaining()).unwrap_or(0)
    }

    /// Whether push negotiation concluded that no listed update would
    /// change its target ("nothing to push").
    pub(crate) fn negotiation_rejected(&self) -> bool {
        self.shared
            .lock()
            .map(|s| s.negotiation_rejected)
            .unwrap_or(false)
    }

    /// Wire everything into a fresh `git2::RemoteCallbacks` set. May be
    /// called more than once for one operation (libgit2 clones the set per
    /// connection); all instances share this orchestrator's state.
    pub fn git_callbacks(&self) -> RemoteCallbacks<'static> {
        let mut cbs = RemoteCallbacks::new();

        let shared = Arc::clone(&self.shared);
        cbs.credentials(move |_url, username_from_url, allowed| {
            let mut s = shared
                .lock()
                .map_err(|_| git2::Error::from_str("callback state poisoned"))?;
            s.cascade.resolve(username_from_url, allowed)
        });

        let shared = Arc::clone(&self.shared);
        let interrupt = self.interrupt.clone();
        cbs.transfer_progress(move |stats| {
            if interrupted(&interrupt) {
                return false;
            }
            let snapshot = TransferSnapshot::from(&stats);
            if let Ok(mut s) = shared.lock() {
                let Shared {
                    reporter,
                    message,
                    progress,
                    ..
                } = &mut *s;
                let lines = reporter.tick(&snapshot);
                if let Some(f) = message.as_mut() {
                    for line in &lines {
                        f(line);
                    }
                }
                if let Some(f) = progress.as_mut() {
                    f(&snapshot);
                }
            }
            true
        });

        let shared = Arc::clone(&self.shared);
        cbs.sideband_progress(move |data| {
            if let Ok(mut s) = shared.lock() {
                if let Some(f) = s.message.as_mut() {
                    if let Ok(text) = std::str::from_utf8(data) {
                        f(&prefix_remote(text));
                    }
                }
            }
            true
        });

        match self.mode {
            Mode::Push => {
                let shared = Arc::clone(&self.shared);
                cbs.push_negotiation(move |updates| {
                    let mut s = shared
                        .lock()
                        .map_err(|_| git2::Error::from_str("callback state poisoned"))?;
                    let (lines, any_change) = refs::negotiate_updates(updates);
                    let Shared {
                        message,
                        negotiation_rejected,
                        ..
                    } = &mut *s;
                    if let Some(f) = message.as_mut() {
                        for line in &lines {
                            f(line);
                        }
                    }
                    if any_change {
                        Ok(())
                    } else {
                        *negotiation_rejected = true;
                        Err(git2::Error::new(
                            ErrorCode::User,
                            ErrorClass::Callback,
                            "no reference updates to push",
                        ))
                    }
                });

                let shared = Arc::clone(&self.shared);
                cbs.push_update_reference(move |refname, status| {
                    if let Some(status) = status {
                        if let Ok(mut s) = shared.lock() {
                            if let Some(f) = s.message.as_mut() {
                                f(&format!("{refname} {status}\n"));
                            }
                        }
                    }
                    Ok(())
                });

                let shared = Arc::clone(&self.shared);
                cbs.push_transfer_progress(move |current, total, bytes| {
                    if let Ok(mut s) = shared.lock() {
                        let Shared {
                            reporter, message, ..
                        } = &mut *s;
                        if let Some(line) = reporter.push_tick(current, total, bytes) {
                            if let Some(f) = message.as_mut() {
                                f(&line);
                            }
                        }
                    }
                });
            }
            Mode::Fetch | Mode::Pull | Mode::Clone => {
                let shared = Arc::clone(&self.shared);
                cbs.update_tips(move |name, old, new| {
                    if old != new {
                        if let Ok(mut s) = shared.lock() {
                            if let Some(f) = s.message.as_mut() {
                                f(&refs::update_line(name, Some(old), Some(new)));
                            }
                        }
                    }
                    true
                });
            }
        }

        cbs
    }
}

fn interrupted(flag: &Option<Arc<AtomicBool>>) -> bool {
    flag.as_ref()
        .map(|f| f.load(Ordering::Relaxed))
        .unwrap_or(false)
}

static SIDEBAND_CONTINUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new("([\r\n]+)([^\r\n])").expect("sideband regex"));

/// Prefix a sideband message with `remote: `, re-prefixing after embedded
/// line breaks so multi-line server messages stay attributed.
fn prefix_remote(text: &str) -> String {
    format!(
        "remote: {}",
        SIDEBAND_CONTINUATION.replace_all(text, "${1}remote: ${2}")
    )
}
