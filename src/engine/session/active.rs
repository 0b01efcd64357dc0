//! ### English
//! Worker-owned half of a render session: acquisition with reverse-order unwind, and teardown.
//!
//! ### 中文
//! 渲染会话中由 worker 持有的部分：带逆序回滚的资源获取，以及资源释放。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dpi::PhysicalSize;

use crate::engine::classifier::ClassifierThresholds;
use crate::engine::config::RenderConfig;
use crate::engine::error::RenderError;
use crate::engine::gpu::{GpuCommands, GpuPlatform, RenderFilter, SampleTarget, TextureId};

use super::SessionId;
use super::input_surface::{FrameListener, InputSurface};
use super::sampler::FrameSampler;
use super::stats::SessionShared;

/// ### English
/// Everything the worker needs to open a session; moved from the caller thread.
///
/// ### 中文
/// worker 打开会话所需的全部参数；从调用线程移交过来。
pub(crate) struct StartRequest<P: GpuPlatform> {
    pub(crate) input_size: PhysicalSize<u32>,
    pub(crate) output_size: PhysicalSize<u32>,
    pub(crate) target: P::Target,
    pub(crate) filter: Box<dyn RenderFilter>,
    pub(crate) input: Arc<InputSurface>,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) config: RenderConfig,
}

/// ### English
/// Resources acquired so far; `unwind` releases them in reverse acquisition order.
///
/// ### 中文
/// 目前已获取的资源；`unwind` 按获取的逆序释放。
struct Acquired<P: GpuPlatform> {
    display: Option<P::Display>,
    context: Option<P::Context>,
    surface: Option<P::Surface>,
    commands: Option<P::Commands>,
    texture: Option<TextureId>,
    sample_target: Option<SampleTarget>,
}

impl<P: GpuPlatform> Acquired<P> {
    fn empty() -> Self {
        Self {
            display: None,
            context: None,
            surface: None,
            commands: None,
            texture: None,
            sample_target: None,
        }
    }

    fn acquire(
        &mut self,
        platform: &mut P,
        target: P::Target,
        input_size: PhysicalSize<u32>,
        sample_size: PhysicalSize<u32>,
    ) -> Result<(), RenderError> {
        let display = self.display.insert(platform.get_display()?);
        platform.initialize(display)?;
        let config = platform.choose_config(display)?;
        let context = self
            .context
            .insert(platform.create_context(display, &config)?);
        let surface = self
            .surface
            .insert(platform.create_surface(display, context, target)?);
        platform.make_current(display, context, surface)?;

        let commands = self
            .commands
            .insert(platform.load_commands(display, context)?);
        let texture = *self
            .texture
            .insert(commands.create_frame_texture(input_size)?);
        self.sample_target = Some(commands.create_sample_target(texture, sample_size)?);
        Ok(())
    }

    fn unwind(self, platform: &mut P) {
        let Self {
            display,
            context,
            surface,
            commands,
            texture,
            sample_target,
        } = self;

        if let Some(commands) = commands {
            if let Some(target) = sample_target {
                commands.delete_sample_target(&target);
            }
            if let Some(texture) = texture {
                commands.delete_texture(texture);
            }
        }

        let Some(mut display) = display else {
            return;
        };
        if let Some(mut context) = context {
            if let Some(surface) = surface {
                platform.destroy_surface(&mut display, &mut context, surface);
            }
            platform.destroy_context(&mut display, context);
        }
        platform.terminate(display);
    }
}

/// ### English
/// Fully acquired GPU state of one running session.
///
/// ### 中文
/// 一个运行中会话的完整 GPU 状态。
pub(super) struct Resources<P: GpuPlatform> {
    pub(super) display: P::Display,
    pub(super) context: P::Context,
    pub(super) surface: P::Surface,
    pub(super) commands: P::Commands,
    pub(super) texture: TextureId,
    pub(super) texture_size: PhysicalSize<u32>,
}

/// ### English
/// Render session state owned by the worker thread. Never leaves that thread.
///
/// ### 中文
/// 由 worker 线程持有的渲染会话状态；永不离开该线程。
pub(crate) struct ActiveSession<P: GpuPlatform> {
    pub(super) id: SessionId,
    pub(super) output_size: PhysicalSize<u32>,
    pub(super) override_transform: Option<[f32; 16]>,
    pub(super) resources: Resources<P>,
    pub(super) sampler: FrameSampler,
    pub(super) filter: Box<dyn RenderFilter>,
    pub(super) input: Arc<InputSurface>,
    pub(super) shared: Arc<SessionShared>,
}

impl<P: GpuPlatform> ActiveSession<P> {
    /// ### English
    /// Acquires display, configuration, context, surface and texture in order, initializes the
    /// filter, then wires `listener` to the input surface.
    ///
    /// On failure or panic everything acquired so far is released in reverse order before
    /// returning.
    ///
    /// #### Parameters
    /// - `platform`: GPU stack owned by the worker.
    /// - `id`: Session id used by the frame-available notification.
    /// - `request`: Parameters moved from the caller.
    /// - `listener`: Posts the frame-available notification back to the worker.
    ///
    /// ### 中文
    /// 依次获取显示、配置、上下文、表面与纹理，初始化滤镜，然后把 `listener` 接到输入表面上。
    ///
    /// 任何一步失败或 panic，都会在返回前按逆序释放已获取的全部资源。
    ///
    /// #### 参数
    /// - `platform`：worker 持有的 GPU 栈。
    /// - `id`：“新帧可用”通知使用的会话 ID。
    /// - `request`：从调用方移交的参数。
    /// - `listener`：把“新帧可用”通知投递回 worker。
    pub(crate) fn open(
        platform: &mut P,
        id: SessionId,
        request: StartRequest<P>,
        listener: FrameListener,
    ) -> Result<Self, RenderError> {
        let StartRequest {
            input_size,
            output_size,
            target,
            mut filter,
            input,
            shared,
            config,
        } = request;
        let sample_size = PhysicalSize::new(config.sample_size, config.sample_size);

        let mut acquired = Acquired::<P>::empty();
        let prepared = panic::catch_unwind(AssertUnwindSafe(|| {
            acquired.acquire(platform, target, input_size, sample_size)?;
            filter.init().map_err(|err| {
                RenderError::initialization_caused_by("render filter init failed", err)
            })
        }))
        .unwrap_or_else(|payload| Err(RenderError::from_panic(payload)));

        if let Err(err) = prepared {
            acquired.unwind(platform);
            return Err(err);
        }

        let (resources, sample_target) = match acquired {
            Acquired {
                display: Some(display),
                context: Some(context),
                surface: Some(surface),
                commands: Some(commands),
                texture: Some(texture),
                sample_target: Some(sample_target),
            } => (
                Resources {
                    display,
                    context,
                    surface,
                    commands,
                    texture,
                    texture_size: input_size,
                },
                sample_target,
            ),
            partial => {
                filter.release();
                partial.unwind(platform);
                return Err(RenderError::initialization("incomplete session resources"));
            }
        };

        input.set_listener(listener);
        tracing::info!(
            session = id,
            input_width = input_size.width,
            input_height = input_size.height,
            output_width = output_size.width,
            output_height = output_size.height,
            "render session started"
        );

        Ok(Self {
            id,
            output_size,
            override_transform: config.override_transform,
            resources,
            sampler: FrameSampler::new(sample_target, ClassifierThresholds::from(&config)),
            filter,
            input,
            shared,
        })
    }

    /// ### English
    /// Tears the session down: stopped flag, listener, filter, texture, surface, context, display,
    /// then the input surface.
    ///
    /// ### 中文
    /// 释放会话：依次处理 stopped 标记、监听器、滤镜、纹理、表面、上下文、显示，最后是输入表面。
    pub(crate) fn stop_and_release(self, platform: &mut P) {
        let Self {
            id,
            resources,
            sampler,
            mut filter,
            input,
            shared,
            ..
        } = self;
        let Resources {
            mut display,
            mut context,
            surface,
            commands,
            texture,
            ..
        } = resources;

        shared.mark_stopped();
        input.detach_listener();

        if let Err(err) = platform.make_current(&mut display, &context, &surface) {
            tracing::warn!(session = id, error = %err, "make current failed during teardown");
        }
        filter.release();
        commands.delete_sample_target(sampler.target());
        commands.delete_texture(texture);
        drop(commands);

        platform.destroy_surface(&mut display, &mut context, surface);
        platform.destroy_context(&mut display, context);
        platform.terminate(display);
        input.release();

        tracing::info!(session = id, "render session released");
    }
}
