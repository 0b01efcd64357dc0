//! ### English
//! Error types for the render session and configuration.
//!
//! The episode detector never fails; its only escalation path is `ResetSignal`.
//!
//! ### 中文
//! 渲染会话与配置的错误类型。
//!
//! 黑帧片段检测器不会返回错误，它唯一的升级路径是 `ResetSignal`。

use std::any::Any;

/// ### English
/// Boxed cause carried by `RenderError::InitializationFailed`.
///
/// ### 中文
/// `RenderError::InitializationFailed` 携带的装箱原因。
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// ### English
/// Failures raised synchronously to `RenderSession::start`, plus steady-state graphics faults.
///
/// Every start failure has already released whatever the worker acquired before it.
///
/// ### 中文
/// 同步返回给 `RenderSession::start` 的失败，以及稳态渲染阶段的图形 API 故障。
///
/// 任何启动失败在返回前，worker 都已释放此前获取的全部资源。
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum RenderError {
    #[error("GPU display unavailable: {0}")]
    DisplayUnavailable(String),

    #[error("initialization failed: {reason}")]
    InitializationFailed {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("no matching GPU configuration: {0}")]
    NoMatchingConfiguration(String),

    #[error("context creation failed: {0}")]
    ContextCreationFailed(String),

    #[error("surface creation failed: {0}")]
    SurfaceCreationFailed(String),

    #[error("make current failed: {0}")]
    MakeCurrentFailed(String),

    /// Unexpected low-level failure while drawing; fatal for the session.
    #[error("graphics API error: {0}")]
    GraphicsApiError(String),

    /// The render worker was asked to quit; it cannot be used or re-created.
    #[error("render worker has quit")]
    WorkerQuit,

    #[error("invalid session state: {0}")]
    InvalidState(&'static str),
}

impl RenderError {
    pub fn initialization(reason: impl Into<String>) -> Self {
        Self::InitializationFailed {
            reason: reason.into(),
            source: None,
        }
    }

    /// ### English
    /// Wraps an arbitrary cause as a generic initialization failure.
    ///
    /// ### 中文
    /// 将任意原因包装为通用的初始化失败。
    pub fn initialization_caused_by(reason: impl Into<String>, source: BoxError) -> Self {
        Self::InitializationFailed {
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// ### English
    /// Converts a panic payload caught on the render worker into an initialization failure.
    ///
    /// ### 中文
    /// 将 render worker 上捕获到的 panic 载荷转换为初始化失败。
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::initialization_caused_by(
            "render worker panicked during start",
            Box::new(PanicError(panic_message(payload.as_ref()))),
        )
    }

    /// ### English
    /// Converts a panic caught while presenting into the fault that disables the session.
    ///
    /// ### 中文
    /// 将呈现过程中捕获到的 panic 转换为使会话失效的故障。
    pub(crate) fn from_render_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::GraphicsApiError(format!(
            "presentation panicked: {}",
            panic_message(payload.as_ref())
        ))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
struct PanicError(String);

/// ### English
/// Rejected detector or render tuning values.
///
/// ### 中文
/// 被拒绝的检测器或渲染调参值。
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("episode band must satisfy 1 <= min ({min}) <= max ({max})")]
    EpisodeBand { min: u32, max: u32 },

    #[error("screen-off run ({screen_off}) must not be shorter than the episode band max ({max})")]
    ScreenOffRun { screen_off: u32, max: u32 },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{name} must be within [0, 1], got {value}")]
    Ratio { name: &'static str, value: f32 },

    #[error("luma threshold must be finite and non-negative, got {0}")]
    LumaThreshold(f64),
}
