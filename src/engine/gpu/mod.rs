//! ### English
//! GPU seam: the platform context/surface API and the GL commands the render worker issues.
//!
//! Every method here runs on the render worker thread; implementations may hold thread-affine
//! state (`Rc`, raw handles) freely.
//!
//! ### 中文
//! GPU 接口层：平台上下文/表面 API，以及渲染 worker 发出的 GL 命令。
//!
//! 这里的所有方法都在渲染 worker 线程上执行；实现可以自由持有线程亲和的状态（`Rc`、原始句柄）。

use std::time::Duration;

use dpi::PhysicalSize;

use crate::engine::error::{BoxError, RenderError};
use crate::engine::frame::ImageFrame;

mod gleam_commands;
mod surfman_platform;
#[cfg(test)]
pub(crate) mod testing;

pub use gleam_commands::GleamCommands;
pub use surfman_platform::{BoundSurface, SurfmanDisplay, SurfmanPlatform, SurfmanTarget};

/// GL texture name.
pub type TextureId = u32;

/// ### English
/// Error returned by `RenderFilter::init`; wrapped into `RenderError::InitializationFailed`.
///
/// ### 中文
/// `RenderFilter::init` 返回的错误；会被包装为 `RenderError::InitializationFailed`。
pub type FilterError = BoxError;

/// ### English
/// Display, context and surface lifecycle of one platform GL stack.
///
/// Acquisition order is `get_display → initialize → choose_config → create_context →
/// create_surface → make_current`; release runs in reverse.
///
/// ### 中文
/// 单一平台 GL 栈的显示、上下文、表面生命周期。
///
/// 获取顺序为 `get_display → initialize → choose_config → create_context → create_surface →
/// make_current`；释放顺序与之相反。
pub trait GpuPlatform {
    /// ### English
    /// Caller-supplied output target; crosses from the caller thread to the worker.
    ///
    /// ### 中文
    /// 调用方提供的输出目标；会从调用线程移交到 worker。
    type Target: Send + 'static;
    type Display;
    type Config;
    type Context;
    type Surface;
    type Commands: GpuCommands;

    fn get_display(&mut self) -> Result<Self::Display, RenderError>;
    fn initialize(&mut self, display: &mut Self::Display) -> Result<(), RenderError>;
    /// ### English
    /// Picks an 8-bit RGBA, hardware-accelerated configuration.
    ///
    /// ### 中文
    /// 选择 8 位 RGBA、硬件加速的配置。
    fn choose_config(&mut self, display: &mut Self::Display) -> Result<Self::Config, RenderError>;
    fn create_context(
        &mut self,
        display: &mut Self::Display,
        config: &Self::Config,
    ) -> Result<Self::Context, RenderError>;
    fn create_surface(
        &mut self,
        display: &mut Self::Display,
        context: &mut Self::Context,
        target: Self::Target,
    ) -> Result<Self::Surface, RenderError>;
    fn make_current(
        &mut self,
        display: &mut Self::Display,
        context: &Self::Context,
        surface: &Self::Surface,
    ) -> Result<(), RenderError>;
    /// ### English
    /// Loads the GL command table for a context that is current on this thread.
    ///
    /// ### 中文
    /// 为已在当前线程 current 的上下文加载 GL 命令表。
    fn load_commands(
        &mut self,
        display: &mut Self::Display,
        context: &Self::Context,
    ) -> Result<Self::Commands, RenderError>;
    /// ### English
    /// Presents the back buffer; `timestamp` is the source presentation time of the frame.
    ///
    /// ### 中文
    /// 呈现后缓冲；`timestamp` 是该帧的源呈现时间。
    fn swap_buffers(
        &mut self,
        display: &mut Self::Display,
        context: &mut Self::Context,
        surface: &mut Self::Surface,
        timestamp: Duration,
    ) -> Result<(), RenderError>;
    fn destroy_surface(
        &mut self,
        display: &mut Self::Display,
        context: &mut Self::Context,
        surface: Self::Surface,
    );
    fn destroy_context(&mut self, display: &mut Self::Display, context: Self::Context);
    fn terminate(&mut self, display: Self::Display);
}

/// ### English
/// Offscreen sample target: a small RGBA framebuffer plus a read framebuffer over the frame texture.
///
/// ### 中文
/// 离屏采样目标：一个小尺寸 RGBA framebuffer，以及挂接帧纹理的读取 framebuffer。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTarget {
    pub framebuffer: u32,
    pub texture: TextureId,
    /// Framebuffer with the frame texture as its color attachment.
    pub source_framebuffer: u32,
    pub source: TextureId,
    pub size: PhysicalSize<u32>,
}

/// ### English
/// GL commands used by the presentation path.
///
/// ### 中文
/// 呈现路径使用的 GL 命令。
pub trait GpuCommands {
    /// ### English
    /// Allocates the `TEXTURE_2D` that receives input-surface images.
    ///
    /// ### 中文
    /// 分配接收输入表面图像的 `TEXTURE_2D`。
    fn create_frame_texture(&self, size: PhysicalSize<u32>) -> Result<TextureId, RenderError>;
    /// ### English
    /// Uploads an RGBA image. `reallocate` re-specifies storage for a new size.
    ///
    /// ### 中文
    /// 上传一张 RGBA 图像；`reallocate` 表示按新尺寸重新分配存储。
    fn upload_frame(&self, texture: TextureId, frame: &ImageFrame, reallocate: bool);
    fn delete_texture(&self, texture: TextureId);
    fn create_sample_target(
        &self,
        source: TextureId,
        size: PhysicalSize<u32>,
    ) -> Result<SampleTarget, RenderError>;
    fn delete_sample_target(&self, target: &SampleTarget);
    fn set_viewport(&self, size: PhysicalSize<u32>);
    /// ### English
    /// Downsamples the source texture into `target` (identity transform) and reads it back as
    /// tightly packed RGBA rows. Leaves the presentation framebuffer bound.
    ///
    /// ### 中文
    /// 以单位变换把源纹理缩采样到 `target`，并以紧密排列的 RGBA 行读回。
    /// 结束后重新绑定呈现用 framebuffer。
    fn read_sample(&self, target: &SampleTarget, source_size: PhysicalSize<u32>) -> Vec<u8>;
    /// ### English
    /// Drains the GL error queue; any pending error becomes `GraphicsApiError`.
    ///
    /// ### 中文
    /// 清空 GL 错误队列；存在任何错误都会变为 `GraphicsApiError`。
    fn check_error(&self) -> Result<(), RenderError>;
}

/// ### English
/// External filter that draws the textured quad. Owned by the session once started.
///
/// ### 中文
/// 绘制纹理四边形的外部滤镜；会话启动后由会话持有。
pub trait RenderFilter: Send {
    fn init(&mut self) -> Result<(), FilterError>;
    fn draw(&mut self, texture: TextureId, transform: &[f32; 16]);
    fn release(&mut self);
}

impl<F: RenderFilter + ?Sized> RenderFilter for Box<F> {
    fn init(&mut self) -> Result<(), FilterError> {
        (**self).init()
    }

    fn draw(&mut self, texture: TextureId, transform: &[f32; 16]) {
        (**self).draw(texture, transform);
    }

    fn release(&mut self) {
        (**self).release();
    }
}
