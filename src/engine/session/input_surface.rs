//! ### English
//! Decoder-facing write target of a render session.
//!
//! Holds at most one pending image (latest wins) and at most one pending "frame available"
//! notification; the worker clears the notification flag before taking the image.
//!
//! ### 中文
//! 渲染会话面向解码器的写入目标。
//!
//! 至多保存一张待处理图像（新图覆盖旧图），并且至多存在一个待处理的“新帧可用”通知；
//! worker 在取图之前先清除通知标记。

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use dpi::PhysicalSize;

use crate::engine::error::RenderError;
use crate::engine::frame::ImageFrame;

pub(crate) type FrameListener = Box<dyn Fn() + Send + Sync>;

/// ### English
/// Image queue between the decoder and the render worker.
///
/// ### 中文
/// 解码器与渲染 worker 之间的图像队列。
pub struct InputSurface {
    size: PhysicalSize<u32>,
    latest: Mutex<Option<ImageFrame>>,
    signal_pending: AtomicBool,
    released: AtomicBool,
    listener: Mutex<Option<FrameListener>>,
}

impl std::fmt::Debug for InputSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSurface")
            .field("size", &self.size)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

impl InputSurface {
    pub(crate) fn new(size: PhysicalSize<u32>) -> Self {
        Self {
            size,
            latest: Mutex::new(None),
            signal_pending: AtomicBool::new(false),
            released: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    /// Size requested at session start.
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// ### English
    /// Queues an RGBA image for presentation, replacing any image not yet consumed.
    ///
    /// Rejected with `InvalidState` once the session released the surface or when the pixel
    /// buffer does not match the frame size.
    ///
    /// ### 中文
    /// 提交一张待呈现的 RGBA 图像，替换尚未被消费的图像。
    ///
    /// 会话释放表面后，或像素缓冲与帧尺寸不符时，返回 `InvalidState`。
    pub fn submit(&self, frame: ImageFrame) -> Result<(), RenderError> {
        if self.is_released() {
            return Err(RenderError::InvalidState("input surface released"));
        }
        if !frame.is_well_formed() {
            return Err(RenderError::InvalidState(
                "image frame does not match its size",
            ));
        }

        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);

        if !self.signal_pending.swap(true, Ordering::AcqRel) {
            let listener = self.listener.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(listener) = listener.as_ref() {
                listener();
            }
        }
        Ok(())
    }

    pub(crate) fn set_listener(&self, listener: FrameListener) {
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener);
    }

    pub(crate) fn detach_listener(&self) {
        self.listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// ### English
    /// Consumes the pending image. Re-arms the notification first so a concurrent `submit` posts
    /// a fresh one.
    ///
    /// ### 中文
    /// 取走待处理图像；先重新启用通知，使并发的 `submit` 能发出新的通知。
    pub(crate) fn take_latest(&self) -> Option<ImageFrame> {
        self.signal_pending.store(false, Ordering::Release);
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub(crate) fn release(&self) {
        self.released.store(true, Ordering::Release);
        self.detach_listener();
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}
