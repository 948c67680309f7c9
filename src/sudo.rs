//! Process-scoped sudo session
//!
//! Privilege is requested once, at the start of a run, and kept alive
//! until the run ends:
//! 1. `acquire()` prompts for the password (`sudo -v`), at most once
//! 2. `maintain()` revalidates in the background (`sudo -n -v`)
//! 3. `release()` stops the keepalive thread and drops the cached
//!    credential (`sudo -k`); every exit path calls it, Drop included
//!
//! The session is the only place that touches the credential cache.
//! Everything else runs commands through [`SudoProvider`].

use anyhow::{Context, Result};
use declarative::{CommandOutput, SudoProvider};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("privilege denied: {0}")]
    Denied(String),

    #[error("privilege is not held")]
    NotHeld,

    #[error("failed to start keepalive thread: {0}")]
    Keepalive(#[from] std::io::Error),
}

/// The credential operations a session needs from the platform
pub trait Authenticator: Send + Sync {
    /// Prompt interactively; `Ok(false)` when the user declines or fails
    fn validate_interactive(&self) -> Result<bool>;

    /// Extend the cached credential without prompting
    fn refresh(&self) -> bool;

    /// Drop the cached credential
    fn invalidate(&self);

    /// Run a command under the cached credential
    fn exec(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// [`Authenticator`] backed by the `sudo` binary
pub struct SudoCli;

impl Authenticator for SudoCli {
    fn validate_interactive(&self) -> Result<bool> {
        let status = Command::new("sudo")
            .arg("-v")
            .status()
            .context("Failed to execute sudo")?;
        Ok(status.success())
    }

    fn refresh(&self) -> bool {
        Command::new("sudo")
            .args(["-n", "-v"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn invalidate(&self) {
        if let Err(e) = Command::new("sudo").arg("-k").status() {
            log::warn!("sudo -k failed: {e}");
        }
    }

    fn exec(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        log::debug!("sudo {} {}", cmd, args.join(" "));
        // -n: never prompt mid-run, the keepalive owns the credential
        let output = Command::new("sudo")
            .arg("-n")
            .arg(cmd)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute: sudo {} {}", cmd, args.join(" ")))?;
        Ok(output.into())
    }
}

struct Keepalive {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    auth: Arc<dyn Authenticator>,
    held: AtomicBool,
    released: AtomicBool,
    keepalive: Mutex<Option<Keepalive>>,
}

impl Inner {
    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);

        let keepalive = self
            .keepalive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(k) = keepalive {
            // A send error means the thread is already gone
            let _ = k.stop.send(());
            if k.handle.join().is_err() {
                log::warn!("sudo keepalive thread panicked");
            }
        }

        if self.held.swap(false, Ordering::SeqCst) {
            log::debug!("Releasing sudo credential");
            self.auth.invalidate();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.release();
    }
}

/// Handle to the run's privilege state.
///
/// Clones share the same state, so the signal listener can release the
/// credential held by the main thread.
#[derive(Clone)]
pub struct PrivilegeSession {
    inner: Arc<Inner>,
}

impl PrivilegeSession {
    pub fn new(auth: Arc<dyn Authenticator>) -> Self {
        Self {
            inner: Arc::new(Inner {
                auth,
                held: AtomicBool::new(false),
                released: AtomicBool::new(false),
                keepalive: Mutex::new(None),
            }),
        }
    }

    /// Session backed by the real `sudo` binary
    pub fn system() -> Self {
        Self::new(Arc::new(SudoCli))
    }

    pub fn is_held(&self) -> bool {
        self.inner.held.load(Ordering::SeqCst)
    }

    /// Obtain privilege interactively. A second call is a no-op.
    pub fn acquire(&self) -> Result<(), PrivilegeError> {
        if self.is_held() {
            return Ok(());
        }
        if self.inner.released.load(Ordering::SeqCst) {
            return Err(PrivilegeError::Denied("session already released".into()));
        }

        match self.inner.auth.validate_interactive() {
            Ok(true) => {
                self.inner.held.store(true, Ordering::SeqCst);
                log::info!("sudo credential acquired");
                Ok(())
            }
            Ok(false) => Err(PrivilegeError::Denied(
                "authentication failed or was declined".into(),
            )),
            Err(e) => Err(PrivilegeError::Denied(format!("{e:#}"))),
        }
    }

    /// Start revalidating every `interval` until release.
    ///
    /// Calling it again while the keepalive runs does nothing.
    pub fn maintain(&self, interval: Duration) -> Result<(), PrivilegeError> {
        if !self.is_held() {
            return Err(PrivilegeError::NotHeld);
        }

        let mut slot = self
            .inner
            .keepalive
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Ok(());
        }

        let (stop, rx) = mpsc::channel::<()>();
        let auth = Arc::clone(&self.inner.auth);
        let handle = thread::Builder::new()
            .name("sudo-keepalive".into())
            .spawn(move || {
                loop {
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if auth.refresh() {
                                log::trace!("sudo credential refreshed");
                            } else {
                                log::warn!("Could not refresh sudo credential");
                            }
                        }
                        // Stop requested, or the session is gone
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        *slot = Some(Keepalive { stop, handle });
        log::debug!("sudo keepalive every {}s", interval.as_secs_f32());
        Ok(())
    }

    /// Stop the keepalive and drop the credential.
    ///
    /// Idempotent, and a no-op for the credential if `acquire` never
    /// succeeded.
    pub fn release(&self) {
        self.inner.release();
    }

    /// Run a command under the held privilege
    pub fn run_privileged(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        if !self.is_held() {
            return Err(PrivilegeError::NotHeld.into());
        }
        self.inner.auth.exec(cmd, args)
    }
}

impl SudoProvider for PrivilegeSession {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        self.run_privileged(cmd, args)
    }
}
