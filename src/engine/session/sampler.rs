//! ### English
//! Render-side sampler: fixed-size downsample of the bound texture, judged by the ratio check.
//!
//! ### 中文
//! 渲染侧采样器：对已绑定纹理做固定尺寸缩采样，并使用比例判定。

use dpi::PhysicalSize;

use crate::engine::classifier::{BlackVerdict, ClassifierThresholds, classify_rgba_sample};
use crate::engine::gpu::{GpuCommands, SampleTarget};

/// ### English
/// Owns the sample target allocated at session start. Cost per sample is independent of the
/// output resolution.
///
/// ### 中文
/// 持有会话启动时分配的采样目标；每次采样的开销与输出分辨率无关。
pub(crate) struct FrameSampler {
    target: SampleTarget,
    thresholds: ClassifierThresholds,
}

impl FrameSampler {
    pub(crate) fn new(target: SampleTarget, thresholds: ClassifierThresholds) -> Self {
        Self { target, thresholds }
    }

    pub(crate) fn target(&self) -> &SampleTarget {
        &self.target
    }

    pub(crate) fn sample<C: GpuCommands>(
        &self,
        commands: &C,
        source_size: PhysicalSize<u32>,
    ) -> BlackVerdict {
        let pixels = commands.read_sample(&self.target, source_size);
        let verdict = classify_rgba_sample(&pixels, self.target.size, &self.thresholds);
        tracing::trace!(?verdict, "texture sample");
        verdict
    }
}
