// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::Error;
use std::sync::{Arc, Condvar, Mutex};

type FlushResult = Result<(), Arc<Error>>;

struct FlushState {
    result: Mutex<Option<FlushResult>>,
    signal: Condvar,
}

/// Handle to one background compaction
///
/// Cloneable; every concurrent `flush` request during a running compaction
/// receives the same handle.
#[derive(Clone)]
pub struct FlushHandle {
    state: Arc<FlushState>,
}

impl FlushHandle {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(FlushState {
                result: Mutex::new(None),
                signal: Condvar::new(),
            }),
        }
    }

    /// A handle that is already completed successfully
    /// (used when there is nothing to flush).
    pub(crate) fn finished() -> Self {
        let handle = Self::new();
        handle.complete(Ok(()));
        handle
    }

    #[allow(clippy::expect_used)]
    pub(crate) fn complete(&self, result: crate::Result<()>) {
        let mut slot = self.state.result.lock().expect("lock is not poisoned");
        *slot = Some(result.map_err(Arc::new));
        self.state.signal.notify_all();
    }

    /// Returns `true` once the compaction has finished (successfully or not).
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn is_done(&self) -> bool {
        self.state
            .result
            .lock()
            .expect("lock is not poisoned")
            .is_some()
    }

    /// Blocks until the compaction finishes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compaction`] if the background task failed.
    #[allow(clippy::expect_used)]
    pub fn wait(&self) -> crate::Result<()> {
        let mut slot = self.state.result.lock().expect("lock is not poisoned");

        while slot.is_none() {
            slot = self
                .state
                .signal
                .wait(slot)
                .expect("lock is not poisoned");
        }

        match slot.as_ref().expect("checked above") {
            Ok(()) => Ok(()),
            Err(e) => Err(Error::Compaction(Arc::clone(e))),
        }
    }
}
