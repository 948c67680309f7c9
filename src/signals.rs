use crate::sudo::PrivilegeSession;
use anyhow::Result;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

/// Set by the signal listener, checked by the orchestrator between steps.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicI32>);

impl InterruptFlag {
    pub fn raise(&self, signal: i32) {
        self.0.store(signal, Ordering::SeqCst);
    }

    /// The signal that interrupted the run, if any
    pub fn signal(&self) -> Option<i32> {
        match self.0.load(Ordering::SeqCst) {
            0 => None,
            sig => Some(sig),
        }
    }
}

/// Conventional exit status for death by `signal`
pub fn exit_code_for(signal: i32) -> i32 {
    128 + signal
}

/// Install SIGINT/SIGTERM handlers.
///
/// The first signal raises the flag and releases privilege; the current
/// step finishes (or dies with its child process) and the run stops at the
/// next step boundary. A second signal exits immediately.
pub fn install_handlers(flag: InterruptFlag, privilege: PrivilegeSession) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            for sig in signals.forever() {
                if flag.signal().is_some() {
                    privilege.release();
                    std::process::exit(exit_code_for(sig));
                }
                log::warn!("Received signal {sig}, stopping after the current step");
                flag.raise(sig);
                privilege.release();
            }
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_clear() {
        assert_eq!(InterruptFlag::default().signal(), None);
    }

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = InterruptFlag::default();
        flag.clone().raise(SIGTERM);
        assert_eq!(flag.signal(), Some(SIGTERM));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(SIGINT), 130);
        assert_eq!(exit_code_for(SIGTERM), 143);
    }
}
