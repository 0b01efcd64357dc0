//! ### English
//! Render session: GPU context/surface lifetime, input surface, presentation driver, and the
//! render-side black-texture sampler.
//!
//! ### 中文
//! 渲染会话：GPU 上下文/表面的生命周期、输入表面、呈现驱动，以及渲染侧黑纹理采样器。
mod active;
mod handle;
mod input_surface;
mod present;
mod sampler;
mod stats;
#[cfg(test)]
mod tests;

pub(crate) use active::{ActiveSession, StartRequest};
pub use handle::{RenderSession, SessionPhase};
pub use input_surface::InputSurface;
pub use stats::SessionStats;

/// Worker-assigned session identifier.
pub type SessionId = u64;
