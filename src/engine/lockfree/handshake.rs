use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;
const TAKEN: u8 = 3;
const ABANDONED: u8 = 4;

/// ### English
/// Shared slot behind a `Completer`/`Waiter` pair.
///
/// ### 中文
/// `Completer`/`Waiter` 对共享的槽位。
struct Slot<T> {
    /// ### English
    /// State machine for this slot:
    ///
    /// - `0` = empty
    /// - `1` = writing
    /// - `2` = ready
    /// - `3` = taken
    /// - `4` = abandoned (completer dropped without a value)
    ///
    /// ### 中文
    /// 槽位状态机：
    ///
    /// - `0` = 空
    /// - `1` = 写入中
    /// - `2` = 就绪
    /// - `3` = 已取走
    /// - `4` = 已放弃（completer 未写值即被 drop）
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
    /// ### English
    /// Waiting thread, unparked on completion or abandonment.
    ///
    /// ### 中文
    /// 等待方线程：完成或放弃时 `unpark()` 唤醒。
    waiter: thread::Thread,
}

unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == READY {
            unsafe {
                drop((*self.value.get()).assume_init_read());
            }
        }
    }
}

/// ### English
/// Producer half: hands exactly one value to the waiting thread.
///
/// Dropping it without calling `complete` wakes the waiter with `None`.
///
/// ### 中文
/// 生产端：向等待线程交付恰好一个值。
///
/// 未调用 `complete` 就 drop 时，等待方会以 `None` 被唤醒。
pub(crate) struct Completer<T> {
    slot: Option<Arc<Slot<T>>>,
}

/// ### English
/// Consumer half. Must be created on, and waited from, the same thread.
///
/// ### 中文
/// 消费端；必须在同一线程上创建并等待。
pub(crate) struct Waiter<T> {
    slot: Arc<Slot<T>>,
}

/// ### English
/// Creates a blocking handshake whose waiter is the current thread.
///
/// ### 中文
/// 创建一个以当前线程为等待方的阻塞握手。
pub(crate) fn handshake<T>() -> (Completer<T>, Waiter<T>) {
    let slot = Arc::new(Slot {
        state: AtomicU8::new(EMPTY),
        value: UnsafeCell::new(MaybeUninit::uninit()),
        waiter: thread::current(),
    });
    (
        Completer {
            slot: Some(slot.clone()),
        },
        Waiter { slot },
    )
}

impl<T> Completer<T> {
    /// ### English
    /// Publishes the value and wakes the waiter.
    ///
    /// ### 中文
    /// 发布值并唤醒等待方。
    pub(crate) fn complete(mut self, value: T) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        if slot
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        unsafe {
            (*slot.value.get()).write(value);
        }
        slot.state.store(READY, Ordering::Release);
        slot.waiter.unpark();
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take()
            && slot
                .state
                .compare_exchange(EMPTY, ABANDONED, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            slot.waiter.unpark();
        }
    }
}

impl<T> Waiter<T> {
    /// ### English
    /// Blocks until the value arrives. Returns `None` if the completer was dropped.
    ///
    /// ### 中文
    /// 阻塞直到值到达；若 completer 已被 drop 则返回 `None`。
    pub(crate) fn wait(self) -> Option<T> {
        loop {
            match self.slot.state.load(Ordering::Acquire) {
                READY => {
                    if self
                        .slot
                        .state
                        .compare_exchange(READY, TAKEN, Ordering::Acquire, Ordering::Relaxed)
                        .is_ok()
                    {
                        return Some(unsafe { (*self.slot.value.get()).assume_init_read() });
                    }
                }
                ABANDONED | TAKEN => return None,
                _ => thread::park(),
            }
        }
    }
}
