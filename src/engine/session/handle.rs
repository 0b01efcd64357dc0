//! ### English
//! Caller-side handle of a render session.
//!
//! ### 中文
//! 渲染会话的调用方句柄。

use std::sync::Arc;

use crossbeam_channel as channel;
use dpi::PhysicalSize;

use crate::engine::config::RenderConfig;
use crate::engine::error::RenderError;
use crate::engine::gpu::{GpuPlatform, RenderFilter};
use crate::engine::lockfree::handshake;
use crate::engine::runtime::{RenderWorker, WorkerMessage};

use super::SessionId;
use super::active::StartRequest;
use super::input_surface::InputSurface;
use super::stats::{SessionShared, SessionStats};

/// ### English
/// Lifecycle of a session. `Stopped` is terminal.
///
/// ### 中文
/// 会话生命周期；`Stopped` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Running,
    Stopped,
}

struct WorkerLink<P: GpuPlatform> {
    id: SessionId,
    sender: channel::Sender<WorkerMessage<P>>,
}

/// ### English
/// One GPU context plus one presentation surface bound to one output target.
///
/// `start` and `stop_and_release` block the calling thread for the full GPU initialization or
/// teardown latency on the worker. They must not be called from the render worker itself.
///
/// ### 中文
/// 一个 GPU 上下文加一个绑定到输出目标的呈现表面。
///
/// `start` 与 `stop_and_release` 会阻塞调用线程，直到 worker 完成 GPU 初始化或释放。
/// 不得在渲染 worker 线程内部调用它们。
pub struct RenderSession<P: GpuPlatform + Send + 'static> {
    config: RenderConfig,
    shared: Arc<SessionShared>,
    phase: SessionPhase,
    link: Option<WorkerLink<P>>,
}

impl<P: GpuPlatform + Send + 'static> RenderSession<P> {
    pub fn new(config: RenderConfig) -> Self {
        let shared = Arc::new(SessionShared::new(config.discard_black_textures));
        Self {
            config,
            shared,
            phase: SessionPhase::Uninitialized,
            link: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[cfg(test)]
    pub(super) fn id(&self) -> Option<SessionId> {
        self.link.as_ref().map(|link| link.id)
    }

    /// ### English
    /// Starts the session on `worker` and returns the surface the decoder writes into.
    ///
    /// Zero sizes and an invalid `RenderConfig` are rejected before the worker is touched. A
    /// failed start has already released everything it acquired; the session is then `Stopped`
    /// and a fresh session must be created.
    ///
    /// #### Parameters
    /// - `worker`: Render worker that will own the GPU state.
    /// - `input_size`: Size of the decoded images.
    /// - `output_size`: Viewport size of the presentation surface.
    /// - `target`: Output target the presentation surface binds to.
    /// - `filter`: External filter that draws the texture.
    ///
    /// ### 中文
    /// 在 `worker` 上启动会话，并返回解码器写入的表面。
    ///
    /// 尺寸为零或 `RenderConfig` 非法时，在接触 worker 之前即被拒绝。启动失败时，已获取的资源都已释放；
    /// 会话随之进入 `Stopped`，需重新创建会话。
    ///
    /// #### 参数
    /// - `worker`：将持有 GPU 状态的渲染 worker。
    /// - `input_size`：解码图像尺寸。
    /// - `output_size`：呈现表面的视口尺寸。
    /// - `target`：呈现表面绑定的输出目标。
    /// - `filter`：绘制纹理的外部滤镜。
    pub fn start<F: RenderFilter + 'static>(
        &mut self,
        worker: &RenderWorker<P>,
        input_size: PhysicalSize<u32>,
        output_size: PhysicalSize<u32>,
        target: P::Target,
        filter: F,
    ) -> Result<Arc<InputSurface>, RenderError> {
        if self.phase != SessionPhase::Uninitialized {
            return Err(RenderError::InvalidState("session already started"));
        }
        self.phase = SessionPhase::Stopped;

        if input_size.width == 0
            || input_size.height == 0
            || output_size.width == 0
            || output_size.height == 0
        {
            return Err(RenderError::initialization(
                "input and output sizes must be non-zero",
            ));
        }

        self.config.validate().map_err(|err| {
            RenderError::initialization_caused_by("invalid render configuration", Box::new(err))
        })?;

        let sender = worker.sender()?;
        let id = worker.next_session_id();
        let input = Arc::new(InputSurface::new(input_size));
        let (done, waiter) = handshake();

        sender
            .send(WorkerMessage::Start {
                id,
                request: StartRequest {
                    input_size,
                    output_size,
                    target,
                    filter: Box::new(filter),
                    input: input.clone(),
                    shared: self.shared.clone(),
                    config: self.config.clone(),
                },
                done,
            })
            .map_err(|_| RenderError::WorkerQuit)?;

        match waiter.wait() {
            Some(Ok(())) => {
                self.phase = SessionPhase::Running;
                self.link = Some(WorkerLink { id, sender });
                Ok(input)
            }
            Some(Err(err)) => Err(err),
            None => Err(RenderError::WorkerQuit),
        }
    }

    /// ### English
    /// Applied from the next notification onward. May be called in any phase.
    ///
    /// ### 中文
    /// 从下一次通知开始生效；任意阶段均可调用。
    pub fn set_discard_black_textures(&self, enabled: bool) {
        self.shared.set_discard_black(enabled);
    }

    pub fn discard_black_textures(&self) -> bool {
        self.shared.discard_black()
    }

    /// ### English
    /// Posts the teardown to the worker and blocks until it completes. Only the first call on a
    /// running session does anything.
    ///
    /// ### 中文
    /// 把释放请求投递给 worker 并阻塞等待完成；只有对运行中会话的第一次调用会生效。
    pub fn stop_and_release(&mut self) {
        if self.phase != SessionPhase::Running {
            return;
        }
        self.phase = SessionPhase::Stopped;
        let Some(WorkerLink { id, sender }) = self.link.take() else {
            return;
        };

        let (done, waiter) = handshake();
        if sender.send(WorkerMessage::Stop { id, done }).is_err() || waiter.wait().is_none() {
            tracing::warn!(
                session = id,
                "render worker quit before stop; resources were released at quit"
            );
            return;
        }
        tracing::info!(session = id, "render session stopped");
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.snapshot()
    }

    /// ### English
    /// Message of the graphics error that disabled this session, if any.
    ///
    /// ### 中文
    /// 使该会话失效的图形错误信息（若有）。
    pub fn fault(&self) -> Option<String> {
        self.shared.fault()
    }

    pub fn is_faulted(&self) -> bool {
        self.shared.is_faulted()
    }
}

impl<P: GpuPlatform + Send + 'static> Drop for RenderSession<P> {
    fn drop(&mut self) {
        self.stop_and_release();
    }
}
