//! ### English
//! Recording fakes for the GPU seam.
//!
//! Every call lands in one shared event log; any acquisition step can be told to fail or panic
//! once.
//!
//! ### 中文
//! GPU 接口的记录型替身。
//!
//! 所有调用都写入同一份共享事件日志；任意获取步骤都可以被设置为失败或 panic 一次。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dpi::PhysicalSize;

use crate::engine::error::RenderError;
use crate::engine::frame::ImageFrame;

use super::{
    FilterError, GpuCommands, GpuPlatform, RenderFilter, SampleTarget, TextureId,
};

/// ### English
/// Acquisition steps that can be made to fail or panic.
///
/// ### 中文
/// 可被注入失败或 panic 的获取步骤。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    GetDisplay,
    Initialize,
    ChooseConfig,
    CreateContext,
    CreateSurface,
    MakeCurrent,
    LoadCommands,
    CreateTexture,
    CreateSampleTarget,
    FilterInit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GpuEvent {
    GetDisplay,
    Initialize,
    ChooseConfig,
    CreateContext,
    CreateSurface,
    MakeCurrent,
    LoadCommands,
    CreateTexture(TextureId),
    CreateSampleTarget,
    FilterInit,
    Upload { reallocate: bool },
    Viewport(PhysicalSize<u32>),
    ReadSample,
    FilterDraw { texture: TextureId, transform: [f32; 16] },
    Swap(Duration),
    FilterRelease,
    DeleteSampleTarget,
    DeleteTexture(TextureId),
    DestroySurface,
    DestroyContext,
    Terminate,
}

/// ### English
/// Shared knobs and event log, cloned into the worker-side fakes.
///
/// ### 中文
/// 共享的控制开关与事件日志，克隆进 worker 侧的各个替身。
#[derive(Default)]
pub(crate) struct FakeGpu {
    events: Mutex<Vec<GpuEvent>>,
    fail_at: Mutex<Option<Step>>,
    gl_fault: AtomicBool,
    panic_at: Mutex<Option<Step>>,
}

impl FakeGpu {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn events(&self) -> Vec<GpuEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// ### English
    /// Next acquisition of `step` fails once.
    ///
    /// ### 中文
    /// 下一次执行 `step` 时失败一次。
    pub(crate) fn fail_once(&self, step: Step) {
        *self.fail_at.lock().unwrap() = Some(step);
    }

    /// Next acquisition of `step` panics once.
    pub(crate) fn panic_once(&self, step: Step) {
        *self.panic_at.lock().unwrap() = Some(step);
    }

    /// Next `check_error` reports a GL error.
    pub(crate) fn inject_gl_error(&self) {
        self.gl_fault.store(true, Ordering::SeqCst);
    }

    pub(crate) fn count(&self, matches: impl Fn(&GpuEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| matches(e)).count()
    }

    fn record(&self, event: GpuEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn maybe_panic(&self, step: Step) {
        let mut panic_at = self.panic_at.lock().unwrap();
        if *panic_at == Some(step) {
            *panic_at = None;
            drop(panic_at);
            panic!("fake gpu panicked at {step:?}");
        }
    }

    fn acquire(&self, step: Step, event: GpuEvent) -> Result<(), RenderError> {
        self.maybe_panic(step);
        let mut fail_at = self.fail_at.lock().unwrap();
        if *fail_at == Some(step) {
            *fail_at = None;
            return Err(match step {
                Step::GetDisplay => RenderError::DisplayUnavailable("fake".into()),
                Step::ChooseConfig => RenderError::NoMatchingConfiguration("fake".into()),
                Step::CreateContext => RenderError::ContextCreationFailed("fake".into()),
                Step::CreateSurface => RenderError::SurfaceCreationFailed("fake".into()),
                Step::MakeCurrent => RenderError::MakeCurrentFailed("fake".into()),
                Step::CreateTexture | Step::CreateSampleTarget => {
                    RenderError::GraphicsApiError("fake".into())
                }
                Step::Initialize | Step::LoadCommands | Step::FilterInit => {
                    RenderError::initialization("fake")
                }
            });
        }
        drop(fail_at);
        self.record(event);
        Ok(())
    }

    fn should_fail(&self, step: Step) -> bool {
        self.maybe_panic(step);
        let mut fail_at = self.fail_at.lock().unwrap();
        if *fail_at == Some(step) {
            *fail_at = None;
            true
        } else {
            false
        }
    }
}

pub(crate) struct FakePlatform {
    gpu: Arc<FakeGpu>,
}

impl FakePlatform {
    pub(crate) fn new(gpu: &Arc<FakeGpu>) -> Self {
        Self { gpu: gpu.clone() }
    }
}

#[derive(Debug)]
pub(crate) struct FakeHandle;

impl GpuPlatform for FakePlatform {
    type Target = ();
    type Display = FakeHandle;
    type Config = FakeHandle;
    type Context = FakeHandle;
    type Surface = FakeHandle;
    type Commands = FakeCommands;

    fn get_display(&mut self) -> Result<FakeHandle, RenderError> {
        self.gpu.acquire(Step::GetDisplay, GpuEvent::GetDisplay)?;
        Ok(FakeHandle)
    }

    fn initialize(&mut self, _display: &mut FakeHandle) -> Result<(), RenderError> {
        self.gpu.acquire(Step::Initialize, GpuEvent::Initialize)
    }

    fn choose_config(&mut self, _display: &mut FakeHandle) -> Result<FakeHandle, RenderError> {
        self.gpu.acquire(Step::ChooseConfig, GpuEvent::ChooseConfig)?;
        Ok(FakeHandle)
    }

    fn create_context(
        &mut self,
        _display: &mut FakeHandle,
        _config: &FakeHandle,
    ) -> Result<FakeHandle, RenderError> {
        self.gpu
            .acquire(Step::CreateContext, GpuEvent::CreateContext)?;
        Ok(FakeHandle)
    }

    fn create_surface(
        &mut self,
        _display: &mut FakeHandle,
        _context: &mut FakeHandle,
        _target: (),
    ) -> Result<FakeHandle, RenderError> {
        self.gpu
            .acquire(Step::CreateSurface, GpuEvent::CreateSurface)?;
        Ok(FakeHandle)
    }

    fn make_current(
        &mut self,
        _display: &mut FakeHandle,
        _context: &FakeHandle,
        _surface: &FakeHandle,
    ) -> Result<(), RenderError> {
        self.gpu.acquire(Step::MakeCurrent, GpuEvent::MakeCurrent)
    }

    fn load_commands(
        &mut self,
        _display: &mut FakeHandle,
        _context: &FakeHandle,
    ) -> Result<FakeCommands, RenderError> {
        self.gpu.acquire(Step::LoadCommands, GpuEvent::LoadCommands)?;
        Ok(FakeCommands {
            gpu: self.gpu.clone(),
            textures: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        })
    }

    fn swap_buffers(
        &mut self,
        _display: &mut FakeHandle,
        _context: &mut FakeHandle,
        _surface: &mut FakeHandle,
        timestamp: Duration,
    ) -> Result<(), RenderError> {
        self.gpu.record(GpuEvent::Swap(timestamp));
        Ok(())
    }

    fn destroy_surface(
        &mut self,
        _display: &mut FakeHandle,
        _context: &mut FakeHandle,
        _surface: FakeHandle,
    ) {
        self.gpu.record(GpuEvent::DestroySurface);
    }

    fn destroy_context(&mut self, _display: &mut FakeHandle, _context: FakeHandle) {
        self.gpu.record(GpuEvent::DestroyContext);
    }

    fn terminate(&mut self, _display: FakeHandle) {
        self.gpu.record(GpuEvent::Terminate);
    }
}

struct FakeTexture {
    size: PhysicalSize<u32>,
    pixels: Vec<u8>,
}

/// ### English
/// Keeps uploaded RGBA images so `read_sample` can downsample them.
///
/// ### 中文
/// 保存上传的 RGBA 图像，供 `read_sample` 降采样。
pub(crate) struct FakeCommands {
    gpu: Arc<FakeGpu>,
    textures: RefCell<HashMap<TextureId, FakeTexture>>,
    next_id: Cell<TextureId>,
}

impl FakeCommands {
    fn allocate(&self, size: PhysicalSize<u32>) -> TextureId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.textures.borrow_mut().insert(
            id,
            FakeTexture {
                size,
                pixels: vec![0; ImageFrame::expected_len(size)],
            },
        );
        id
    }
}

impl GpuCommands for FakeCommands {
    fn create_frame_texture(&self, size: PhysicalSize<u32>) -> Result<TextureId, RenderError> {
        if self.gpu.should_fail(Step::CreateTexture) {
            return Err(RenderError::GraphicsApiError("fake".into()));
        }
        let id = self.allocate(size);
        self.gpu.record(GpuEvent::CreateTexture(id));
        Ok(id)
    }

    fn upload_frame(&self, texture: TextureId, frame: &ImageFrame, reallocate: bool) {
        self.gpu.record(GpuEvent::Upload { reallocate });
        if let Some(slot) = self.textures.borrow_mut().get_mut(&texture) {
            slot.size = frame.size;
            slot.pixels.clone_from(&frame.pixels);
        }
    }

    fn delete_texture(&self, texture: TextureId) {
        self.textures.borrow_mut().remove(&texture);
        self.gpu.record(GpuEvent::DeleteTexture(texture));
    }

    fn create_sample_target(
        &self,
        source: TextureId,
        size: PhysicalSize<u32>,
    ) -> Result<SampleTarget, RenderError> {
        if self.gpu.should_fail(Step::CreateSampleTarget) {
            return Err(RenderError::GraphicsApiError("fake".into()));
        }
        let texture = self.allocate(size);
        self.gpu.record(GpuEvent::CreateSampleTarget);
        Ok(SampleTarget {
            framebuffer: 100 + texture,
            texture,
            source_framebuffer: 200 + source,
            source,
            size,
        })
    }

    fn delete_sample_target(&self, target: &SampleTarget) {
        self.textures.borrow_mut().remove(&target.texture);
        self.gpu.record(GpuEvent::DeleteSampleTarget);
    }

    fn set_viewport(&self, size: PhysicalSize<u32>) {
        self.gpu.record(GpuEvent::Viewport(size));
    }

    fn read_sample(&self, target: &SampleTarget, source_size: PhysicalSize<u32>) -> Vec<u8> {
        self.gpu.record(GpuEvent::ReadSample);
        let textures = self.textures.borrow();
        let Some(source) = textures.get(&target.source) else {
            return Vec::new();
        };

        let (width, height) = (target.size.width as usize, target.size.height as usize);
        let src_w = source_size.width.min(source.size.width) as usize;
        let src_h = source_size.height.min(source.size.height) as usize;
        let mut sample = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            let sy = y * src_h / height;
            for x in 0..width {
                let sx = x * src_w / width;
                let offset = (sy * source.size.width as usize + sx) * 4;
                sample.extend_from_slice(&source.pixels[offset..offset + 4]);
            }
        }
        sample
    }

    fn check_error(&self) -> Result<(), RenderError> {
        if self.gpu.gl_fault.swap(false, Ordering::SeqCst) {
            Err(RenderError::GraphicsApiError("GL error 0x0502".into()))
        } else {
            Ok(())
        }
    }
}

/// Filter that logs `init`, `draw` and `release`.
pub(crate) struct RecordingFilter {
    gpu: Arc<FakeGpu>,
}

impl RecordingFilter {
    pub(crate) fn new(gpu: &Arc<FakeGpu>) -> Self {
        Self { gpu: gpu.clone() }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("filter shader failed to compile")]
pub(crate) struct FilterInitError;

impl RenderFilter for RecordingFilter {
    fn init(&mut self) -> Result<(), FilterError> {
        if self.gpu.should_fail(Step::FilterInit) {
            return Err(Box::new(FilterInitError));
        }
        self.gpu.record(GpuEvent::FilterInit);
        Ok(())
    }

    fn draw(&mut self, texture: TextureId, transform: &[f32; 16]) {
        self.gpu.record(GpuEvent::FilterDraw {
            texture,
            transform: *transform,
        });
    }

    fn release(&mut self) {
        self.gpu.record(GpuEvent::FilterRelease);
    }
}

/// ### English
/// Filter whose `draw` always panics; `init` and `release` are still recorded.
///
/// ### 中文
/// `draw` 总是 panic 的滤镜；`init` 与 `release` 仍会被记录。
pub(crate) struct PanickingFilter {
    gpu: Arc<FakeGpu>,
}

impl PanickingFilter {
    pub(crate) fn new(gpu: &Arc<FakeGpu>) -> Self {
        Self { gpu: gpu.clone() }
    }
}

impl RenderFilter for PanickingFilter {
    fn init(&mut self) -> Result<(), FilterError> {
        self.gpu.record(GpuEvent::FilterInit);
        Ok(())
    }

    fn draw(&mut self, _texture: TextureId, _transform: &[f32; 16]) {
        panic!("filter draw exploded");
    }

    fn release(&mut self) {
        self.gpu.record(GpuEvent::FilterRelease);
    }
}
