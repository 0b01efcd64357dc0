//! ### English
//! Explicitly constructed render worker with a create / quit / join lifecycle.
//!
//! ### 中文
//! 显式构造的渲染 worker，具备 创建 / 退出 / join 的生命周期。

use std::mem;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel as channel;

use crate::engine::config::RenderConfig;
use crate::engine::error::RenderError;
use crate::engine::gpu::GpuPlatform;
use crate::engine::lockfree::handshake;
use crate::engine::session::SessionId;

use super::command::WorkerMessage;
use super::render_thread;

/// Default thread name of the render worker.
pub const DEFAULT_WORKER_NAME: &str = "frame-gate-render";

enum WorkerPhase<P: GpuPlatform> {
    /// ### English
    /// Not started yet; the thread is spawned on first use.
    ///
    /// ### 中文
    /// 尚未启动；首次使用时才创建线程。
    Idle(P),
    Running {
        sender: channel::Sender<WorkerMessage<P>>,
        thread: thread::JoinHandle<()>,
    },
    /// ### English
    /// Quit requested (irrevocable). `thread` is taken by `join`.
    ///
    /// ### 中文
    /// 已请求退出（不可撤销）。`thread` 由 `join` 取走。
    Quit {
        thread: Option<thread::JoinHandle<()>>,
    },
}

/// ### English
/// The single thread that owns all GPU state for the sessions it runs.
///
/// The thread is created lazily by the first session start. `quit` is one-shot and irrevocable;
/// afterwards every use fails with `RenderError::WorkerQuit`. `join` blocks until the thread has
/// released its remaining sessions and exited. Dropping the worker performs both.
///
/// ### 中文
/// 唯一持有其所运行会话全部 GPU 状态的线程。
///
/// 线程在第一次启动会话时才被创建。`quit` 只能执行一次且不可撤销；之后任何使用都会返回
/// `RenderError::WorkerQuit`。`join` 会阻塞直到线程释放剩余会话并退出。drop 时会依次执行二者。
pub struct RenderWorker<P: GpuPlatform + Send + 'static> {
    name: String,
    phase: Mutex<WorkerPhase<P>>,
    next_id: AtomicU64,
}

impl<P: GpuPlatform + Send + 'static> RenderWorker<P> {
    pub fn new(platform: P) -> Self {
        Self::with_name(platform, DEFAULT_WORKER_NAME)
    }

    /// Uses `RenderConfig::worker_name` as the thread name.
    pub fn from_config(platform: P, config: &RenderConfig) -> Self {
        Self::with_name(platform, config.worker_name.clone())
    }

    pub fn with_name(platform: P, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: Mutex::new(WorkerPhase::Idle(platform)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// ### English
    /// Whether the worker thread has been spawned and not yet asked to quit.
    ///
    /// ### 中文
    /// worker 线程是否已创建且尚未被要求退出。
    pub fn is_running(&self) -> bool {
        matches!(*self.lock(), WorkerPhase::Running { .. })
    }

    pub fn is_quit(&self) -> bool {
        matches!(*self.lock(), WorkerPhase::Quit { .. })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WorkerPhase<P>> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn next_session_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// ### English
    /// Returns a sender into the worker, spawning the thread on first use.
    ///
    /// ### 中文
    /// 返回发往 worker 的 sender；首次使用时创建线程。
    pub(crate) fn sender(&self) -> Result<channel::Sender<WorkerMessage<P>>, RenderError> {
        let mut phase = self.lock();
        match &*phase {
            WorkerPhase::Running { sender, .. } => return Ok(sender.clone()),
            WorkerPhase::Quit { .. } => return Err(RenderError::WorkerQuit),
            WorkerPhase::Idle(_) => {}
        }

        let WorkerPhase::Idle(platform) =
            mem::replace(&mut *phase, WorkerPhase::Quit { thread: None })
        else {
            return Err(RenderError::WorkerQuit);
        };

        let (sender, receiver) = channel::unbounded();
        let notify = sender.clone();
        let thread = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || render_thread::run_render_thread(platform, receiver, notify))
            .map_err(|err| {
                RenderError::initialization_caused_by("failed to spawn render worker", Box::new(err))
            })?;

        tracing::debug!(name = %self.name, "render worker spawned");
        *phase = WorkerPhase::Running {
            sender: sender.clone(),
            thread,
        };
        Ok(sender)
    }

    /// ### English
    /// Barrier: blocks until every message posted before this call has been handled.
    ///
    /// ### 中文
    /// 屏障：阻塞直到本次调用之前投递的所有消息都已处理完毕。
    pub fn sync(&self) -> Result<(), RenderError> {
        let sender = self.sender()?;
        let (done, waiter) = handshake();
        sender
            .send(WorkerMessage::Sync { done })
            .map_err(|_| RenderError::WorkerQuit)?;
        waiter.wait().ok_or(RenderError::WorkerQuit)
    }

    /// ### English
    /// Requests quit. Messages already queued are handled first; sessions still open are released
    /// on the worker. Repeated calls are no-ops.
    ///
    /// ### 中文
    /// 请求退出。已排队的消息会先被处理；仍然打开的会话会在 worker 上被释放。重复调用无效果。
    pub fn quit(&self) {
        let mut phase = self.lock();
        *phase = match mem::replace(&mut *phase, WorkerPhase::Quit { thread: None }) {
            WorkerPhase::Idle(_) => {
                tracing::debug!(name = %self.name, "render worker quit before first use");
                WorkerPhase::Quit { thread: None }
            }
            WorkerPhase::Running { sender, thread } => {
                let _ = sender.send(WorkerMessage::Quit);
                tracing::debug!(name = %self.name, "render worker quit requested");
                WorkerPhase::Quit {
                    thread: Some(thread),
                }
            }
            quit @ WorkerPhase::Quit { .. } => quit,
        };
    }

    /// ### English
    /// Blocks until the worker thread has exited. Must follow `quit`.
    ///
    /// ### 中文
    /// 阻塞直到 worker 线程退出；必须在 `quit` 之后调用。
    pub fn join(&self) -> Result<(), RenderError> {
        let thread = match &mut *self.lock() {
            WorkerPhase::Quit { thread } => thread.take(),
            _ => return Err(RenderError::InvalidState("render worker joined before quit")),
        };

        if let Some(thread) = thread
            && thread.join().is_err()
        {
            tracing::error!(name = %self.name, "render worker panicked");
        }
        Ok(())
    }
}

impl<P: GpuPlatform + Send + 'static> Drop for RenderWorker<P> {
    fn drop(&mut self) {
        self.quit();
        let _ = self.join();
    }
}
