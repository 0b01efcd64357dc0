//! ### English
//! Presentation driver: runs once per "frame available" notification on the worker.
//!
//! ### 中文
//! 呈现驱动：在 worker 上针对每一次“新帧可用”通知执行一次。

use std::panic::{self, AssertUnwindSafe};

use crate::engine::error::RenderError;
use crate::engine::gpu::{GpuCommands, GpuPlatform};

use super::active::ActiveSession;

impl<P: GpuPlatform> ActiveSession<P> {
    /// ### English
    /// Handles one notification. A graphics error or a panic faults this session only; later
    /// notifications are ignored and nothing is retried.
    ///
    /// ### 中文
    /// 处理一次通知。图形错误或 panic 只会使本会话进入故障状态；之后的通知都会被忽略，且不做重试。
    pub(crate) fn on_frame_available(&mut self, platform: &mut P) {
        if self.shared.is_stopped() || self.shared.is_faulted() {
            tracing::trace!(session = self.id, "notification ignored");
            return;
        }

        let presented = panic::catch_unwind(AssertUnwindSafe(|| self.present(platform)))
            .unwrap_or_else(|payload| Err(RenderError::from_render_panic(payload)));
        if let Err(err) = presented {
            tracing::error!(session = self.id, error = %err, "presentation failed; session disabled");
            self.shared.mark_faulted(err.to_string());
        }
    }

    fn present(&mut self, platform: &mut P) -> Result<(), RenderError> {
        let resources = &mut self.resources;
        platform.make_current(
            &mut resources.display,
            &resources.context,
            &resources.surface,
        )?;
        resources.commands.set_viewport(self.output_size);

        let Some(frame) = self.input.take_latest() else {
            self.shared.record_empty();
            return Ok(());
        };

        let reallocate = frame.size != resources.texture_size;
        resources
            .commands
            .upload_frame(resources.texture, &frame, reallocate);
        resources.texture_size = frame.size;
        resources.commands.check_error()?;

        let transform = self.override_transform.unwrap_or(frame.transform);

        if self.shared.discard_black() {
            let verdict = self.sampler.sample(&resources.commands, frame.size);
            resources.commands.check_error()?;
            if verdict.is_black {
                tracing::debug!(session = self.id, ?verdict, "black texture discarded");
                self.shared.record_discarded();
                return Ok(());
            }
        }

        self.filter.draw(resources.texture, &transform);
        resources.commands.check_error()?;
        platform.swap_buffers(
            &mut resources.display,
            &mut resources.context,
            &mut resources.surface,
            frame.timestamp,
        )?;
        self.shared.record_presented();
        Ok(())
    }
}
