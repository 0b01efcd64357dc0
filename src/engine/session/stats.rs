//! ### English
//! State shared between a session's caller handle and its worker-side resources.
//!
//! ### 中文
//! 会话调用方句柄与 worker 侧资源之间共享的状态。

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// ### English
/// Presentation counters snapshot.
///
/// ### 中文
/// 呈现计数快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_presented: u64,
    /// Frames consumed but skipped because the sampler judged them black.
    pub frames_discarded: u64,
    /// Notifications that found no pending image.
    pub empty_notifications: u64,
}

/// ### English
/// Atomics written by the worker and read from any thread.
///
/// ### 中文
/// 由 worker 写入、可从任意线程读取的原子状态。
#[derive(Debug)]
pub(crate) struct SessionShared {
    discard_black: AtomicBool,
    stopped: AtomicBool,
    faulted: AtomicBool,
    presented: AtomicU64,
    discarded: AtomicU64,
    empty: AtomicU64,
    fault: Mutex<Option<String>>,
}

impl SessionShared {
    pub(crate) fn new(discard_black: bool) -> Self {
        Self {
            discard_black: AtomicBool::new(discard_black),
            stopped: AtomicBool::new(false),
            faulted: AtomicBool::new(false),
            presented: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            empty: AtomicU64::new(0),
            fault: Mutex::new(None),
        }
    }

    #[inline]
    pub(crate) fn discard_black(&self) -> bool {
        self.discard_black.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_discard_black(&self, enabled: bool) {
        self.discard_black.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_faulted(&self, message: String) {
        *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(message);
        self.faulted.store(true, Ordering::Release);
    }

    pub(crate) fn fault(&self) -> Option<String> {
        self.fault.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn record_presented(&self) {
        self.presented.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty(&self) {
        self.empty.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_presented: self.presented.load(Ordering::Relaxed),
            frames_discarded: self.discarded.load(Ordering::Relaxed),
            empty_notifications: self.empty.load(Ordering::Relaxed),
        }
    }
}
