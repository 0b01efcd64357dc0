/// ### English
/// `mirror_frame_gate` crate root.
/// Decides, at the decoder sink and again just before presentation, whether a mirrored video
/// frame is predominantly black; drops it or escalates a `ResetSignal`.
///
/// ### 中文
/// `mirror_frame_gate` 的 crate 根。
/// 分别在解码 sink 与呈现之前判断投屏视频帧是否以黑色为主；对其丢弃或升级为 `ResetSignal`。
pub mod engine;

pub use engine::classifier::{BlackVerdict, ClassifierThresholds, classify_frame, classify_rgba_sample};
pub use engine::config::{DetectorConfig, GateConfig, RenderConfig};
pub use engine::detector::{BlackFrameSink, DetectorState, FrameSink};
pub use engine::error::{ConfigError, RenderError};
pub use engine::events::{ResetNotifier, ResetSignal};
pub use engine::frame::{DecodedFrame, ImageFrame, PixelFormat, Plane, StreamParams};
pub use engine::gpu::{GpuCommands, GpuPlatform, RenderFilter, SurfmanPlatform, SurfmanTarget};
pub use engine::runtime::RenderWorker;
pub use engine::session::{InputSurface, RenderSession, SessionPhase, SessionStats};
