//! ### English
//! `GpuPlatform` over surfman: connection → hardware device → context descriptor → context →
//! widget surface bound to the context.
//!
//! ### 中文
//! 基于 surfman 的 `GpuPlatform`：connection → 硬件 device → 上下文描述符 → 上下文 →
//! 绑定到上下文的 widget 表面。

use std::rc::Rc;
use std::time::Duration;

use gleam::gl::{self, Gl};
use surfman::{
    Connection, Context, ContextAttributeFlags, ContextAttributes, ContextDescriptor, Device,
    GLApi, GLVersion, NativeWidget, SurfaceAccess, SurfaceType,
};

use crate::engine::error::RenderError;

use super::{GleamCommands, GpuPlatform};

/// ### English
/// Native window the session presents into.
///
/// ### 中文
/// 会话呈现到的原生窗口。
pub struct SurfmanTarget {
    widget: NativeWidget,
}

impl SurfmanTarget {
    pub fn new(widget: NativeWidget) -> Self {
        Self { widget }
    }
}

// SAFETY: the widget handle is only dereferenced by surfman on the render worker, after the
// target has been moved there; the host keeps the native window alive until the session stops.
unsafe impl Send for SurfmanTarget {}

/// ### English
/// Connection plus the device created by `initialize`.
///
/// ### 中文
/// connection 以及由 `initialize` 创建的 device。
pub struct SurfmanDisplay {
    connection: Connection,
    device: Option<Device>,
}

impl SurfmanDisplay {
    fn device(&mut self) -> Result<&mut Device, RenderError> {
        self.device
            .as_mut()
            .ok_or_else(|| RenderError::initialization("surfman device not initialized"))
    }
}

/// ### English
/// Marker for the surface, which lives bound inside the surfman context.
///
/// ### 中文
/// 表面标记：实际表面绑定在 surfman 上下文内部。
#[derive(Debug)]
pub struct BoundSurface(());

/// ### English
/// Stateless surfman platform; all handles live in the per-session resources.
///
/// ### 中文
/// 无状态的 surfman 平台；所有句柄都保存在每会话的资源中。
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfmanPlatform;

const CONTEXT_VERSION: GLVersion = GLVersion { major: 3, minor: 0 };

impl GpuPlatform for SurfmanPlatform {
    type Target = SurfmanTarget;
    type Display = SurfmanDisplay;
    type Config = ContextDescriptor;
    type Context = Context;
    type Surface = BoundSurface;
    type Commands = GleamCommands;

    fn get_display(&mut self) -> Result<SurfmanDisplay, RenderError> {
        let connection = Connection::new().map_err(|err| {
            RenderError::DisplayUnavailable(format!("Failed to create surfman Connection: {err:?}"))
        })?;
        Ok(SurfmanDisplay {
            connection,
            device: None,
        })
    }

    fn initialize(&mut self, display: &mut SurfmanDisplay) -> Result<(), RenderError> {
        let adapter = display
            .connection
            .create_hardware_adapter()
            .map_err(|err| RenderError::initialization(format!("no hardware adapter: {err:?}")))?;
        let device = display
            .connection
            .create_device(&adapter)
            .map_err(|err| RenderError::initialization(format!("device creation: {err:?}")))?;
        display.device = Some(device);
        Ok(())
    }

    fn choose_config(
        &mut self,
        display: &mut SurfmanDisplay,
    ) -> Result<ContextDescriptor, RenderError> {
        let device = display.device()?;
        let attributes = ContextAttributes {
            version: CONTEXT_VERSION,
            flags: ContextAttributeFlags::ALPHA,
        };
        let descriptor = device
            .create_context_descriptor(&attributes)
            .map_err(|err| RenderError::NoMatchingConfiguration(format!("{err:?}")))?;

        let chosen = device.context_descriptor_attributes(&descriptor);
        if !chosen.flags.contains(ContextAttributeFlags::ALPHA) {
            return Err(RenderError::NoMatchingConfiguration(
                "configuration lacks an alpha channel".to_string(),
            ));
        }
        Ok(descriptor)
    }

    fn create_context(
        &mut self,
        display: &mut SurfmanDisplay,
        config: &ContextDescriptor,
    ) -> Result<Context, RenderError> {
        display
            .device()?
            .create_context(config, None)
            .map_err(|err| RenderError::ContextCreationFailed(format!("{err:?}")))
    }

    fn create_surface(
        &mut self,
        display: &mut SurfmanDisplay,
        context: &mut Context,
        target: SurfmanTarget,
    ) -> Result<BoundSurface, RenderError> {
        let device = display.device()?;
        let surface = device
            .create_surface(
                context,
                SurfaceAccess::GPUOnly,
                SurfaceType::Widget {
                    native_widget: target.widget,
                },
            )
            .map_err(|err| RenderError::SurfaceCreationFailed(format!("{err:?}")))?;

        device
            .bind_surface_to_context(context, surface)
            .map_err(|(err, mut surface)| {
                let _ = device.destroy_surface(context, &mut surface);
                RenderError::SurfaceCreationFailed(format!("bind to context: {err:?}"))
            })?;
        Ok(BoundSurface(()))
    }

    fn make_current(
        &mut self,
        display: &mut SurfmanDisplay,
        context: &Context,
        _surface: &BoundSurface,
    ) -> Result<(), RenderError> {
        display
            .device()
            .map_err(|err| RenderError::MakeCurrentFailed(err.to_string()))?
            .make_context_current(context)
            .map_err(|err| RenderError::MakeCurrentFailed(format!("{err:?}")))
    }

    fn load_commands(
        &mut self,
        display: &mut SurfmanDisplay,
        context: &Context,
    ) -> Result<GleamCommands, RenderError> {
        let device = display.device()?;
        let gl: Rc<dyn Gl> = unsafe {
            match device.gl_api() {
                GLApi::GL => {
                    gl::GlFns::load_with(|symbol| device.get_proc_address(context, symbol))
                }
                GLApi::GLES => {
                    gl::GlesFns::load_with(|symbol| device.get_proc_address(context, symbol))
                }
            }
        };

        let default_framebuffer = device
            .context_surface_info(context)
            .ok()
            .flatten()
            .and_then(|info| info.framebuffer_object)
            .map_or(0, |framebuffer| framebuffer.0.get());

        Ok(GleamCommands::new(gl, default_framebuffer))
    }

    fn swap_buffers(
        &mut self,
        display: &mut SurfmanDisplay,
        context: &mut Context,
        _surface: &mut BoundSurface,
        timestamp: Duration,
    ) -> Result<(), RenderError> {
        let device = display.device()?;
        tracing::trace!(?timestamp, "presenting surface");

        let mut surface = device
            .unbind_surface_from_context(context)
            .map_err(|err| RenderError::GraphicsApiError(format!("unbind surface: {err:?}")))?
            .ok_or_else(|| {
                RenderError::GraphicsApiError("no surface bound to context".to_string())
            })?;

        let presented = device
            .present_surface(context, &mut surface)
            .map_err(|err| RenderError::GraphicsApiError(format!("present surface: {err:?}")));

        device
            .bind_surface_to_context(context, surface)
            .map_err(|(err, mut surface)| {
                let _ = device.destroy_surface(context, &mut surface);
                RenderError::GraphicsApiError(format!("rebind surface: {err:?}"))
            })?;
        presented
    }

    fn destroy_surface(
        &mut self,
        display: &mut SurfmanDisplay,
        context: &mut Context,
        _surface: BoundSurface,
    ) {
        let Ok(device) = display.device() else {
            return;
        };
        match device.unbind_surface_from_context(context) {
            Ok(Some(mut surface)) => {
                if let Err(err) = device.destroy_surface(context, &mut surface) {
                    tracing::warn!(error = ?err, "failed to destroy surface");
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = ?err, "failed to unbind surface"),
        }
    }

    fn destroy_context(&mut self, display: &mut SurfmanDisplay, mut context: Context) {
        let Ok(device) = display.device() else {
            return;
        };
        let _ = device.make_no_context_current();
        if let Err(err) = device.destroy_context(&mut context) {
            tracing::warn!(error = ?err, "failed to destroy context");
        }
    }

    fn terminate(&mut self, display: SurfmanDisplay) {
        drop(display);
    }
}
