/// ### English
/// Frame-quality gate internals: decode-side detector, render worker, and render sessions.
///
/// ### 中文
/// 帧质量门控的内部模块：解码侧检测器、渲染 worker 与渲染会话。
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod frame;
pub mod gpu;
pub(crate) mod lockfree;
pub mod runtime;
pub mod session;
