//! ### English
//! Render worker thread: owns the GPU platform and every active session.
//!
//! ### 中文
//! 渲染 worker 线程：持有 GPU 平台以及所有活动会话。

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel as channel;

use crate::engine::error::RenderError;
use crate::engine::gpu::GpuPlatform;
use crate::engine::session::{ActiveSession, SessionId};

use super::command::WorkerMessage;

/// ### English
/// Worker entry function. Returns after `Quit`, once remaining sessions are released.
///
/// Messages still queued behind `Quit` are dropped, which releases their waiters.
///
/// ### 中文
/// worker 入口函数。收到 `Quit` 并释放剩余会话后返回。
///
/// 排在 `Quit` 之后的消息会被丢弃，从而释放它们的等待方。
pub(super) fn run_render_thread<P: GpuPlatform + 'static>(
    mut platform: P,
    receiver: channel::Receiver<WorkerMessage<P>>,
    notify: channel::Sender<WorkerMessage<P>>,
) {
    tracing::debug!("render worker started");
    let mut sessions: HashMap<SessionId, ActiveSession<P>> = HashMap::new();

    while let Ok(message) = receiver.recv() {
        match message {
            WorkerMessage::Start { id, request, done } => {
                let notify = notify.clone();
                let listener = Box::new(move || {
                    let _ = notify.send(WorkerMessage::FrameAvailable { id });
                });

                let opened = panic::catch_unwind(AssertUnwindSafe(|| {
                    ActiveSession::open(&mut platform, id, request, listener)
                }))
                .unwrap_or_else(|payload| Err(RenderError::from_panic(payload)));

                match opened {
                    Ok(session) => {
                        sessions.insert(id, session);
                        done.complete(Ok(()));
                    }
                    Err(err) => {
                        tracing::warn!(session = id, error = %err, "render session failed to start");
                        done.complete(Err(err));
                    }
                }
            }
            WorkerMessage::FrameAvailable { id } => match sessions.get_mut(&id) {
                Some(session) => session.on_frame_available(&mut platform),
                None => tracing::trace!(session = id, "late frame notification ignored"),
            },
            WorkerMessage::Stop { id, done } => {
                match sessions.remove(&id) {
                    Some(session) => session.stop_and_release(&mut platform),
                    None => tracing::debug!(session = id, "stop for unknown session"),
                }
                done.complete(());
            }
            WorkerMessage::Sync { done } => done.complete(()),
            WorkerMessage::Quit => break,
        }
    }

    for (id, session) in sessions.drain() {
        tracing::debug!(session = id, "releasing session at worker quit");
        session.stop_and_release(&mut platform);
    }

    let dropped = receiver.try_iter().count();
    if dropped > 0 {
        tracing::debug!(dropped, "discarded messages queued after quit");
    }
    tracing::debug!("render worker exited");
}
