//! ### English
//! Tuning values supplied by the surrounding application.
//!
//! Defaults match the deployed mirroring client; treat them as a starting point and tune against
//! the actual device/decoder combination.
//!
//! ### 中文
//! 由上层应用提供的调参值。
//!
//! 默认值取自已部署的投屏客户端，仅作为起点，应针对实际设备/解码器组合调整。

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::runtime::DEFAULT_WORKER_NAME;

/// ### English
/// Complete frame-gate configuration.
///
/// ### 中文
/// 完整的帧质量门控配置。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    pub detector: DetectorConfig,
    pub render: RenderConfig,
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        self.render.validate()
    }
}

/// ### English
/// Sink-side classifier thresholds and episode policy.
///
/// ### 中文
/// 解码侧分类阈值与黑帧片段策略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// ### English
    /// Mean luma below which a planar frame is black, in the buffer's native 8-bit scale.
    ///
    /// ### 中文
    /// 平面格式帧判黑的平均亮度阈值（缓冲区原生 8 位刻度）。
    pub luma_threshold: f64,
    /// ### English
    /// Normalized luminance (`0..=1`) below which one packed pixel counts as dark.
    ///
    /// ### 中文
    /// 单个交错像素计为“暗”的归一化亮度阈值（`0..=1`）。
    pub dark_pixel_threshold: f32,
    /// Fraction of dark pixels above which a packed frame is black.
    pub dark_ratio_threshold: f32,
    /// ### English
    /// Maximum sample points per axis for packed frames.
    ///
    /// ### 中文
    /// 交错格式帧每个轴向的最大采样点数。
    pub sample_grid: u32,
    pub episode_min_run: u32,
    pub episode_max_run: u32,
    /// ### English
    /// Runs longer than this are a device-off condition, never an episode.
    ///
    /// ### 中文
    /// 超过该长度的连续黑帧视为设备息屏，不计为片段。
    pub screen_off_run: u32,
    pub trigger_episodes: u32,
    /// ### English
    /// Frames without a new episode after which the episode count expires.
    ///
    /// ### 中文
    /// 连续多少帧未出现新片段后，片段计数过期清零。
    pub quiet_period_frames: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            luma_threshold: 30.0,
            dark_pixel_threshold: 0.1,
            dark_ratio_threshold: 0.95,
            sample_grid: 64,
            episode_min_run: 2,
            episode_max_run: 5,
            screen_off_run: 10,
            trigger_episodes: 3,
            quiet_period_frames: 300,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.luma_threshold.is_finite() || self.luma_threshold < 0.0 {
            return Err(ConfigError::LumaThreshold(self.luma_threshold));
        }
        check_ratio("dark_pixel_threshold", self.dark_pixel_threshold)?;
        check_ratio("dark_ratio_threshold", self.dark_ratio_threshold)?;
        if self.sample_grid == 0 {
            return Err(ConfigError::Zero("sample_grid"));
        }
        if self.episode_min_run == 0 || self.episode_min_run > self.episode_max_run {
            return Err(ConfigError::EpisodeBand {
                min: self.episode_min_run,
                max: self.episode_max_run,
            });
        }
        if self.screen_off_run < self.episode_max_run {
            return Err(ConfigError::ScreenOffRun {
                screen_off: self.screen_off_run,
                max: self.episode_max_run,
            });
        }
        if self.trigger_episodes == 0 {
            return Err(ConfigError::Zero("trigger_episodes"));
        }
        if self.quiet_period_frames == 0 {
            return Err(ConfigError::Zero("quiet_period_frames"));
        }
        Ok(())
    }
}

/// ### English
/// Render-side sampling and presentation options.
///
/// ### 中文
/// 渲染侧采样与呈现选项。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// ### English
    /// Initial value of the discard switch; `RenderSession::set_discard_black_textures` overrides it.
    ///
    /// ### 中文
    /// 丢弃开关的初始值；可由 `RenderSession::set_discard_black_textures` 覆盖。
    pub discard_black_textures: bool,
    /// Edge length of the square offscreen sample target.
    pub sample_size: u32,
    pub dark_pixel_threshold: f32,
    pub dark_ratio_threshold: f32,
    /// ### English
    /// Fixed texture transform replacing the per-frame one (fixed-orientation override).
    ///
    /// ### 中文
    /// 替代逐帧矩阵的固定纹理变换（用于固定方向覆盖）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_transform: Option<[f32; 16]>,
    /// Thread name of the render worker.
    pub worker_name: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            discard_black_textures: true,
            sample_size: 32,
            dark_pixel_threshold: 0.1,
            dark_ratio_threshold: 0.95,
            override_transform: None,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_size == 0 {
            return Err(ConfigError::Zero("sample_size"));
        }
        check_ratio("render.dark_pixel_threshold", self.dark_pixel_threshold)?;
        check_ratio("render.dark_ratio_threshold", self.dark_ratio_threshold)
    }
}

fn check_ratio(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Ratio { name, value })
    }
}
