//! ### English
//! Sink-side black-frame detector.
//! Splits the episode state machine and the decoder-facing sink adapter into submodules.
//!
//! ### 中文
//! 解码侧黑帧检测器。
//! 将黑帧片段状态机与面向解码器的 sink 适配器拆分到子模块。

mod episode;
mod sink;

pub use episode::{DetectorState, EpisodePolicy, EpisodeTracker};
pub use sink::{BlackFrameSink, FrameSink};
