//! ### English
//! Message protocol between caller threads and the render worker.
//!
//! ### 中文
//! 调用线程与渲染 worker 之间的消息协议。

use crate::engine::error::RenderError;
use crate::engine::gpu::GpuPlatform;
use crate::engine::lockfree::Completer;
use crate::engine::session::{SessionId, StartRequest};

/// ### English
/// Messages drained in order by the render worker.
///
/// ### 中文
/// 由渲染 worker 按顺序处理的消息。
pub(crate) enum WorkerMessage<P: GpuPlatform> {
    /// ### English
    /// Opens a session; the result is handed back through `done`.
    ///
    /// ### 中文
    /// 打开一个会话；结果通过 `done` 回传。
    Start {
        id: SessionId,
        request: StartRequest<P>,
        done: Completer<Result<(), RenderError>>,
    },
    /// ### English
    /// Posted by the input surface when a new image is pending.
    ///
    /// ### 中文
    /// 输入表面有新图像待处理时投递。
    FrameAvailable { id: SessionId },
    Stop {
        id: SessionId,
        done: Completer<()>,
    },
    /// ### English
    /// Barrier: completes once every earlier message has been handled.
    ///
    /// ### 中文
    /// 屏障：在此前所有消息处理完毕后完成。
    Sync { done: Completer<()> },
    /// ### English
    /// Tears down remaining sessions and exits the worker loop.
    ///
    /// ### 中文
    /// 释放剩余会话并退出 worker 循环。
    Quit,
}
