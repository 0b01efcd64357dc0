//! ### English
//! Frame classifier: decides whether a frame (or a small render-side sample) is predominantly black.
//!
//! Pure queries only; nothing here mutates state.
//!
//! ### 中文
//! 帧分类器：判断一帧（或渲染侧的小尺寸采样）是否以黑色为主。
//!
//! 纯查询函数，不修改任何状态。

use dpi::PhysicalSize;

use super::config::{DetectorConfig, RenderConfig};
use super::frame::{DecodedFrame, Plane, SampleLayout};

const LUMA_RED: f32 = 0.299;
const LUMA_GREEN: f32 = 0.587;
const LUMA_BLUE: f32 = 0.114;

/// ### English
/// Thresholds used by one classification pass.
///
/// ### 中文
/// 单次分类使用的阈值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierThresholds {
    /// Mean-luma threshold for planar formats (native 8-bit scale).
    pub luma_threshold: f64,
    /// Normalized per-pixel luminance threshold for packed formats.
    pub dark_pixel_threshold: f32,
    /// Dark-pixel fraction above which a packed frame is black.
    pub dark_ratio_threshold: f32,
    /// Maximum sample points per axis for packed frames.
    pub sample_grid: u32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self::from(&DetectorConfig::default())
    }
}

impl From<&DetectorConfig> for ClassifierThresholds {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            luma_threshold: config.luma_threshold,
            dark_pixel_threshold: config.dark_pixel_threshold,
            dark_ratio_threshold: config.dark_ratio_threshold,
            sample_grid: config.sample_grid,
        }
    }
}

impl From<&RenderConfig> for ClassifierThresholds {
    fn from(config: &RenderConfig) -> Self {
        Self {
            dark_pixel_threshold: config.dark_pixel_threshold,
            dark_ratio_threshold: config.dark_ratio_threshold,
            ..Self::default()
        }
    }
}

/// Diagnostic value behind a verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Mean luma over the luma plane (native scale).
    MeanLuma(f64),
    /// Fraction of sampled pixels below the dark-pixel threshold.
    DarkRatio(f32),
}

/// ### English
/// Output of one classification pass.
///
/// `measurement` is `None` when the input could not be measured (unsupported format, malformed
/// buffer); such verdicts are always "not black".
///
/// ### 中文
/// 单次分类的结果。
///
/// 输入无法测量（格式不支持、缓冲区异常）时 `measurement` 为 `None`，此时结论恒为“非黑”。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackVerdict {
    pub is_black: bool,
    pub measurement: Option<Measurement>,
}

impl BlackVerdict {
    /// Fail-open verdict for inputs that cannot be measured.
    pub const UNMEASURED: Self = Self {
        is_black: false,
        measurement: None,
    };
}

/// ### English
/// Classifies one raw decoded frame.
///
/// - Planar luma formats: black if the mean of plane 0 is below `luma_threshold`.
/// - Packed RGB formats: black if the dark-pixel fraction over a uniform grid exceeds
///   `dark_ratio_threshold`.
/// - Anything else fails open.
///
/// ### 中文
/// 对一帧原始解码帧进行分类。
///
/// - 平面亮度格式：plane 0 平均值低于 `luma_threshold` 即为黑。
/// - 交错 RGB 格式：均匀网格上暗像素比例超过 `dark_ratio_threshold` 即为黑。
/// - 其它格式直接放行。
pub fn classify_frame(frame: &DecodedFrame<'_>, thresholds: &ClassifierThresholds) -> BlackVerdict {
    let Some(layout) = frame.format.sample_layout() else {
        return BlackVerdict::UNMEASURED;
    };
    let Some(plane) = frame.planes.first() else {
        return BlackVerdict::UNMEASURED;
    };

    match layout {
        SampleLayout::PlanarLuma => match mean_luma(plane, frame.size) {
            Some(mean) => {
                tracing::debug!(mean, threshold = thresholds.luma_threshold, "frame luminance");
                BlackVerdict {
                    is_black: mean < thresholds.luma_threshold,
                    measurement: Some(Measurement::MeanLuma(mean)),
                }
            }
            None => BlackVerdict::UNMEASURED,
        },
        SampleLayout::PackedRgb { .. } => {
            match dark_ratio(plane, frame.size, layout, thresholds, thresholds.sample_grid) {
                Some(ratio) => {
                    tracing::debug!(ratio, threshold = thresholds.dark_ratio_threshold, "frame dark ratio");
                    ratio_verdict(ratio, thresholds)
                }
                None => BlackVerdict::UNMEASURED,
            }
        }
    }
}

/// ### English
/// Classifies a tightly packed RGBA8 readback (every pixel is examined).
///
/// ### 中文
/// 对紧密排列的 RGBA8 读回数据进行分类（检查每一个像素）。
pub fn classify_rgba_sample(
    pixels: &[u8],
    size: PhysicalSize<u32>,
    thresholds: &ClassifierThresholds,
) -> BlackVerdict {
    let plane = Plane {
        data: pixels,
        stride: size.width as usize * 4,
    };
    let layout = SampleLayout::PackedRgb {
        bytes_per_pixel: 4,
        red: 0,
        green: 1,
        blue: 2,
    };
    let grid = size.width.max(size.height);
    match dark_ratio(&plane, size, layout, thresholds, grid) {
        Some(ratio) => ratio_verdict(ratio, thresholds),
        None => BlackVerdict::UNMEASURED,
    }
}

fn ratio_verdict(ratio: f32, thresholds: &ClassifierThresholds) -> BlackVerdict {
    BlackVerdict {
        is_black: ratio > thresholds.dark_ratio_threshold,
        measurement: Some(Measurement::DarkRatio(ratio)),
    }
}

/// ### English
/// Whether the plane holds `height` rows of `row_bytes` each.
///
/// ### 中文
/// plane 是否能容纳 `height` 行、每行 `row_bytes` 字节。
fn fits(plane: &Plane<'_>, row_bytes: usize, height: usize) -> bool {
    if row_bytes == 0 || height == 0 || plane.stride < row_bytes {
        return false;
    }
    (height - 1)
        .checked_mul(plane.stride)
        .and_then(|offset| offset.checked_add(row_bytes))
        .is_some_and(|required| required <= plane.data.len())
}

fn mean_luma(plane: &Plane<'_>, size: PhysicalSize<u32>) -> Option<f64> {
    let width = size.width as usize;
    let height = size.height as usize;
    if !fits(plane, width, height) {
        return None;
    }

    let sum: u64 = plane
        .data
        .chunks(plane.stride)
        .take(height)
        .map(|row| row[..width].iter().map(|&sample| u64::from(sample)).sum::<u64>())
        .sum();
    Some(sum as f64 / (width * height) as f64)
}

fn dark_ratio(
    plane: &Plane<'_>,
    size: PhysicalSize<u32>,
    layout: SampleLayout,
    thresholds: &ClassifierThresholds,
    grid: u32,
) -> Option<f32> {
    let SampleLayout::PackedRgb {
        bytes_per_pixel,
        red,
        green,
        blue,
    } = layout
    else {
        return None;
    };

    let width = size.width as usize;
    let height = size.height as usize;
    if !fits(plane, width * bytes_per_pixel, height) {
        return None;
    }

    let grid = grid.max(1) as usize;
    let columns = width.min(grid);
    let rows = height.min(grid);

    let mut dark = 0usize;
    for row in 0..rows {
        let y = row * height / rows;
        let line = &plane.data[y * plane.stride..];
        for column in 0..columns {
            let x = column * width / columns;
            let pixel = &line[x * bytes_per_pixel..];
            let luminance = (LUMA_RED * f32::from(pixel[red])
                + LUMA_GREEN * f32::from(pixel[green])
                + LUMA_BLUE * f32::from(pixel[blue]))
                / 255.0;
            if luminance < thresholds.dark_pixel_threshold {
                dark += 1;
            }
        }
    }

    Some(dark as f32 / (rows * columns) as f32)
}
