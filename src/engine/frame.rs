//! ### English
//! Frame types shared by the decode-side detector and the render path.
//!
//! ### 中文
//! 解码侧检测器与渲染路径共享的帧类型。

use std::time::Duration;

use dpi::PhysicalSize;

/// ### English
/// Column-major 4x4 identity matrix.
///
/// ### 中文
/// 列主序 4x4 单位矩阵。
pub const IDENTITY_TRANSFORM: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, //
];

/// ### English
/// Pixel formats a decoder may hand to a sink.
///
/// Unknown formats are carried as `Other` with the decoder's native tag so the classifier can
/// fail open on them.
///
/// ### 中文
/// 解码器可能交给 sink 的像素格式。
///
/// 未知格式以 `Other` 携带解码器原生标记，分类器对其直接放行（判为非黑）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar Y, U, V (4:2:0).
    Yuv420p,
    /// Planar Y + interleaved UV (4:2:0).
    Nv12,
    /// Planar Y + interleaved VU (4:2:0).
    Nv21,
    Rgb24,
    Bgr24,
    Rgba,
    Bgra,
    Other(u32),
}

/// ### English
/// How samples are laid out in plane 0, as far as the classifier cares.
///
/// ### 中文
/// 分类器关心的 plane 0 样本布局。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SampleLayout {
    /// ### English
    /// Plane 0 holds one 8-bit luma sample per pixel.
    ///
    /// ### 中文
    /// plane 0 为每像素一个 8 位亮度样本。
    PlanarLuma,
    /// ### English
    /// Plane 0 holds interleaved color channels.
    ///
    /// ### 中文
    /// plane 0 为交错存放的颜色通道。
    PackedRgb {
        bytes_per_pixel: usize,
        red: usize,
        green: usize,
        blue: usize,
    },
}

impl PixelFormat {
    pub(crate) fn sample_layout(self) -> Option<SampleLayout> {
        match self {
            Self::Yuv420p | Self::Nv12 | Self::Nv21 => Some(SampleLayout::PlanarLuma),
            Self::Rgb24 => Some(SampleLayout::PackedRgb {
                bytes_per_pixel: 3,
                red: 0,
                green: 1,
                blue: 2,
            }),
            Self::Bgr24 => Some(SampleLayout::PackedRgb {
                bytes_per_pixel: 3,
                red: 2,
                green: 1,
                blue: 0,
            }),
            Self::Rgba => Some(SampleLayout::PackedRgb {
                bytes_per_pixel: 4,
                red: 0,
                green: 1,
                blue: 2,
            }),
            Self::Bgra => Some(SampleLayout::PackedRgb {
                bytes_per_pixel: 4,
                red: 2,
                green: 1,
                blue: 0,
            }),
            Self::Other(_) => None,
        }
    }
}

/// One plane of image data.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    /// ### English
    /// Bytes between the starts of two consecutive rows (may exceed the visible row width).
    ///
    /// ### 中文
    /// 相邻两行起始位置之间的字节数（可能大于可见行宽）。
    pub stride: usize,
}

/// ### English
/// A borrowed raw decoded frame, valid for the duration of one `push`.
///
/// ### 中文
/// 借用的原始解码帧，仅在一次 `push` 调用期间有效。
#[derive(Debug, Clone, Copy)]
pub struct DecodedFrame<'a> {
    pub format: PixelFormat,
    pub size: PhysicalSize<u32>,
    pub planes: &'a [Plane<'a>],
    pub pts: Option<Duration>,
}

/// ### English
/// Stream parameters passed to `FrameSink::open`.
///
/// ### 中文
/// 传给 `FrameSink::open` 的流参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub size: PhysicalSize<u32>,
    pub format: PixelFormat,
}

/// ### English
/// One RGBA8 image written by the decoder into an `InputSurface`.
///
/// `transform` plays the role of the per-frame texture transform reported by the image queue;
/// a session-level override replaces it when configured.
///
/// ### 中文
/// 解码器写入 `InputSurface` 的一张 RGBA8 图像。
///
/// `transform` 对应图像队列随帧给出的纹理变换矩阵；若会话配置了覆盖矩阵则以覆盖矩阵为准。
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    pub size: PhysicalSize<u32>,
    pub pixels: Vec<u8>,
    pub timestamp: Duration,
    pub transform: [f32; 16],
}

impl ImageFrame {
    pub fn new(size: PhysicalSize<u32>, pixels: Vec<u8>, timestamp: Duration) -> Self {
        Self {
            size,
            pixels,
            timestamp,
            transform: IDENTITY_TRANSFORM,
        }
    }

    pub fn with_transform(mut self, transform: [f32; 16]) -> Self {
        self.transform = transform;
        self
    }

    /// ### English
    /// Number of bytes a tightly packed RGBA8 buffer of `size` must hold.
    ///
    /// ### 中文
    /// 尺寸为 `size` 的紧密排列 RGBA8 缓冲区应有的字节数。
    pub fn expected_len(size: PhysicalSize<u32>) -> usize {
        size.width as usize * size.height as usize * 4
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.size.width > 0
            && self.size.height > 0
            && self.pixels.len() == Self::expected_len(self.size)
    }
}
