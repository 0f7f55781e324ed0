//! Display wake lock
//!
//! Keeps the screen on while narration plays. Entirely best-effort: failures
//! are logged and playback carries on without the lock.

use crate::error::WakeLockError;
use std::process::{Child, Command, Stdio};
use storytime_common::config::WakeLockConfig;
use tracing::{debug, info, warn};

/// Platform mechanism able to hand out wake locks
pub trait WakeLockProvider {
    fn request(&mut self) -> Result<Box<dyn WakeLockHandle>, WakeLockError>;
}

/// A granted lock; releasing consumes it
pub trait WakeLockHandle {
    fn release(self: Box<Self>) -> Result<(), WakeLockError>;
}

/// Tracks at most one lock handle
///
/// `acquire` while a lock is held swaps the old handle for a fresh one, so
/// exactly one handle is ever tracked. `release` is idempotent.
pub struct WakeLockManager {
    provider: Box<dyn WakeLockProvider>,
    held: Option<Box<dyn WakeLockHandle>>,
}

impl WakeLockManager {
    pub fn new(provider: impl WakeLockProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            held: None,
        }
    }

    /// Manager whose every request reports unsupported
    pub fn disabled() -> Self {
        Self::new(DisabledWakeLock)
    }

    pub fn from_config(config: &WakeLockConfig) -> Self {
        if config.enabled {
            Self::new(InhibitorProvider::new(config.command.clone()))
        } else {
            Self::disabled()
        }
    }

    /// Request the lock; failure is logged and otherwise ignored
    pub fn acquire(&mut self) {
        match self.provider.request() {
            Ok(handle) => {
                if let Some(previous) = self.held.replace(handle) {
                    release_handle(previous);
                }
                debug!("Wake lock acquired");
            }
            Err(e) => warn!("Wake lock unavailable: {}", e),
        }
    }

    /// Release the lock if held
    pub fn release(&mut self) {
        if let Some(handle) = self.held.take() {
            release_handle(handle);
            debug!("Wake lock released");
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }
}

impl Drop for WakeLockManager {
    fn drop(&mut self) {
        self.release();
    }
}

fn release_handle(handle: Box<dyn WakeLockHandle>) {
    if let Err(e) = handle.release() {
        warn!("Wake lock release failed: {}", e);
    }
}

/// Provider used when the wake lock is switched off
pub struct DisabledWakeLock;

impl WakeLockProvider for DisabledWakeLock {
    fn request(&mut self) -> Result<Box<dyn WakeLockHandle>, WakeLockError> {
        Err(WakeLockError::Unsupported("disabled in configuration".to_string()))
    }
}

/// Holds the lock by keeping an inhibitor process alive
///
/// The default command is `systemd-inhibit ... sleep infinity`; the lock is
/// released by killing the process.
pub struct InhibitorProvider {
    command: Vec<String>,
}

impl InhibitorProvider {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl WakeLockProvider for InhibitorProvider {
    fn request(&mut self) -> Result<Box<dyn WakeLockHandle>, WakeLockError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| WakeLockError::Unsupported("no inhibitor command".to_string()))?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        info!("Inhibitor '{}' started (pid {})", program, child.id());
        Ok(Box::new(InhibitorHandle { child: Some(child) }))
    }
}

struct InhibitorHandle {
    child: Option<Child>,
}

impl InhibitorHandle {
    fn stop(&mut self) -> Result<(), WakeLockError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            child.kill()?;
        }
        child.wait()?;
        Ok(())
    }
}

impl WakeLockHandle for InhibitorHandle {
    fn release(mut self: Box<Self>) -> Result<(), WakeLockError> {
        self.stop()
    }
}

impl Drop for InhibitorHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
