//! ### English
//! Recovery event produced by the episode detector and consumed by the host event loop.
//!
//! ### 中文
//! 由黑帧片段检测器产生、由宿主事件循环消费的恢复事件。

use crossbeam_channel as channel;

/// ### English
/// Marker requesting that the video pipeline be torn down and rebuilt.
///
/// ### 中文
/// 请求拆除并重建视频管线的标记事件。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResetSignal;

/// ### English
/// Delivery seam for `ResetSignal`. Implementations must not block the decoder thread.
///
/// ### 中文
/// `ResetSignal` 的投递接口。实现不得阻塞解码线程。
pub trait ResetNotifier {
    fn notify_reset(&self, signal: ResetSignal);
}

impl ResetNotifier for channel::Sender<ResetSignal> {
    fn notify_reset(&self, signal: ResetSignal) {
        match self.try_send(signal) {
            Ok(()) => {}
            // A reset is already queued; one pending request is enough.
            Err(channel::TrySendError::Full(_)) => {
                tracing::debug!("reset signal already pending");
            }
            Err(channel::TrySendError::Disconnected(_)) => {
                tracing::warn!("reset signal dropped: recovery handler is gone");
            }
        }
    }
}

impl<N: ResetNotifier + ?Sized> ResetNotifier for std::sync::Arc<N> {
    fn notify_reset(&self, signal: ResetSignal) {
        (**self).notify_reset(signal);
    }
}
