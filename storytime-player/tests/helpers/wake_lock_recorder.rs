//! Wake-lock provider that records what the controller did with it

use std::cell::Cell;
use std::rc::Rc;
use storytime_player::error::WakeLockError;
use storytime_player::playback::wake_lock::{WakeLockHandle, WakeLockProvider};

/// Shared view of the recorder's counters
#[derive(Debug, Clone, Default)]
pub struct WakeLockLog {
    granted: Rc<Cell<u32>>,
    released: Rc<Cell<u32>>,
    refused: Rc<Cell<u32>>,
}

impl WakeLockLog {
    pub fn granted(&self) -> u32 {
        self.granted.get()
    }

    pub fn released(&self) -> u32 {
        self.released.get()
    }

    pub fn refused(&self) -> u32 {
        self.refused.get()
    }

    /// Locks granted and not yet released
    pub fn outstanding(&self) -> u32 {
        self.granted.get() - self.released.get()
    }
}

pub struct RecordingWakeLock {
    log: WakeLockLog,
    refuse: bool,
}

impl RecordingWakeLock {
    pub fn new() -> (Self, WakeLockLog) {
        let log = WakeLockLog::default();
        (
            Self {
                log: log.clone(),
                refuse: false,
            },
            log,
        )
    }

    /// Provider that refuses every request, like a platform without support
    pub fn refusing() -> (Self, WakeLockLog) {
        let (mut provider, log) = Self::new();
        provider.refuse = true;
        (provider, log)
    }
}

struct RecordedHandle {
    log: WakeLockLog,
}

impl WakeLockProvider for RecordingWakeLock {
    fn request(&mut self) -> Result<Box<dyn WakeLockHandle>, WakeLockError> {
        if self.refuse {
            self.log.refused.set(self.log.refused.get() + 1);
            return Err(WakeLockError::Unsupported("refused by test".to_string()));
        }
        self.log.granted.set(self.log.granted.get() + 1);
        Ok(Box::new(RecordedHandle {
            log: self.log.clone(),
        }))
    }
}

impl WakeLockHandle for RecordedHandle {
    fn release(self: Box<Self>) -> Result<(), WakeLockError> {
        self.log.released.set(self.log.released.get() + 1);
        Ok(())
    }
}
