//! ### English
//! Decoder-facing sink contract and the black-frame detector adapter.
//!
//! The adapter owns its detector state directly; the decoder drives it through `&mut self`, which
//! encodes the single-delivery-thread requirement in the type system.
//!
//! ### 中文
//! 面向解码器的 sink 契约，以及黑帧检测适配器。
//!
//! 适配器直接持有检测状态；解码器通过 `&mut self` 驱动它，在类型层面表达“单一投递线程”的要求。

use crate::engine::classifier::{ClassifierThresholds, classify_frame};
use crate::engine::config::DetectorConfig;
use crate::engine::error::ConfigError;
use crate::engine::events::ResetNotifier;
use crate::engine::frame::{DecodedFrame, PixelFormat, StreamParams};

use super::episode::{DetectorState, EpisodePolicy, EpisodeTracker};

/// ### English
/// A pluggable consumer of raw decoded frames.
///
/// The decoder calls `open` before any `push` and `close` after the last one.
///
/// ### 中文
/// 原始解码帧的可插拔消费者。
///
/// 解码器保证先调用 `open` 再 `push`，并在最后一次 `push` 之后调用 `close`。
pub trait FrameSink {
    fn open(&mut self, params: &StreamParams) -> bool;
    fn close(&mut self);
    /// ### English
    /// Delivers one frame. Returning `false` asks the decoder to stop the pipeline.
    ///
    /// ### 中文
    /// 投递一帧；返回 `false` 表示请求解码器终止管线。
    fn push(&mut self, frame: &DecodedFrame<'_>) -> bool;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn open(&mut self, params: &StreamParams) -> bool {
        (**self).open(params)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn push(&mut self, frame: &DecodedFrame<'_>) -> bool {
        (**self).push(frame)
    }
}

/// ### English
/// Sink that classifies every frame and escalates repeated blinking as a `ResetSignal`.
///
/// It never stops the pipeline on its own authority: `push` always accepts the frame.
///
/// ### 中文
/// 对每一帧分类，并把反复闪烁升级为 `ResetSignal` 的 sink。
///
/// 它从不自行终止管线：`push` 总是接受该帧。
pub struct BlackFrameSink<N: ResetNotifier> {
    thresholds: ClassifierThresholds,
    tracker: EpisodeTracker,
    notifier: N,
    /// ### English
    /// Last unsupported format reported, so the warning fires once per format change.
    ///
    /// ### 中文
    /// 最近一次上报的不支持格式，使警告在格式变化时只触发一次。
    unsupported: Option<PixelFormat>,
}

impl<N: ResetNotifier> BlackFrameSink<N> {
    /// ### English
    /// Builds the sink from validated tuning values.
    ///
    /// #### Errors
    /// Returns the `ConfigError` of `DetectorConfig::validate`.
    ///
    /// ### 中文
    /// 由校验通过的调参值构建 sink。
    ///
    /// #### 错误
    /// 返回 `DetectorConfig::validate` 给出的 `ConfigError`。
    pub fn new(config: &DetectorConfig, notifier: N) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            thresholds: ClassifierThresholds::from(config),
            tracker: EpisodeTracker::new(EpisodePolicy::from(config)),
            notifier,
            unsupported: None,
        })
    }

    /// Snapshot of the detector counters.
    pub fn state(&self) -> DetectorState {
        self.tracker.state()
    }

    /// ### English
    /// Explicit re-init of the detector state (thresholds and policy are kept).
    ///
    /// ### 中文
    /// 显式重新初始化检测状态（保留阈值与策略）。
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.unsupported = None;
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

impl<N: ResetNotifier> FrameSink for BlackFrameSink<N> {
    fn open(&mut self, params: &StreamParams) -> bool {
        tracing::debug!(
            width = params.size.width,
            height = params.size.height,
            format = ?params.format,
            "black frame detector opened"
        );
        true
    }

    fn close(&mut self) {}

    fn push(&mut self, frame: &DecodedFrame<'_>) -> bool {
        tracing::trace!(
            frame = self.tracker.state().total_frames + 1,
            width = frame.size.width,
            height = frame.size.height,
            format = ?frame.format,
            "processing frame"
        );

        if frame.format.sample_layout().is_none() {
            if self.unsupported != Some(frame.format) {
                tracing::warn!(format = ?frame.format, "unsupported pixel format for black frame detection");
                self.unsupported = Some(frame.format);
            }
        } else {
            self.unsupported = None;
        }

        let verdict = classify_frame(frame, &self.thresholds);
        if let Some(signal) = self.tracker.observe(verdict.is_black) {
            self.notifier.notify_reset(signal);
        }
        true
    }
}
