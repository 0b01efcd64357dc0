//! ### English
//! Episode state machine: turns per-frame black verdicts into at most one reset request.
//!
//! Runs of one black frame are noise, short runs inside the episode band are "blinking", and runs
//! past the screen-off ceiling are a device-off condition that must not be mistaken for blinking.
//!
//! ### 中文
//! 黑帧片段状态机：把逐帧的黑帧结论转换为（至多一次的）重置请求。
//!
//! 单帧黑属于噪声；落在片段区间内的短连续黑帧视为“闪烁”；超过息屏上限的长连续黑帧属于设备息屏，
//! 不得与闪烁混淆。

use crate::engine::config::DetectorConfig;
use crate::engine::events::ResetSignal;

/// ### English
/// Running classification memory. Only ever mutated on the decoder's delivery thread.
///
/// ### 中文
/// 运行中的分类记忆；只在解码器投递线程上修改。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorState {
    /// Consecutive black frames in the current run.
    pub black_run_length: u32,
    pub total_frames: u64,
    pub recent_episode_count: u32,
    pub frames_since_last_episode: u32,
}

/// ### English
/// Episode band, screen-off ceiling, trigger count and quiet period.
///
/// ### 中文
/// 片段区间、息屏上限、触发次数与静默期。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodePolicy {
    pub episode_min_run: u32,
    pub episode_max_run: u32,
    pub screen_off_run: u32,
    pub trigger_episodes: u32,
    pub quiet_period_frames: u32,
}

impl Default for EpisodePolicy {
    fn default() -> Self {
        Self::from(&DetectorConfig::default())
    }
}

impl From<&DetectorConfig> for EpisodePolicy {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            episode_min_run: config.episode_min_run,
            episode_max_run: config.episode_max_run,
            screen_off_run: config.screen_off_run,
            trigger_episodes: config.trigger_episodes,
            quiet_period_frames: config.quiet_period_frames,
        }
    }
}

impl EpisodePolicy {
    #[inline]
    fn is_episode(&self, run: u32) -> bool {
        (self.episode_min_run..=self.episode_max_run).contains(&run)
    }
}

/// ### English
/// Applies verdicts strictly in delivery order.
///
/// ### 中文
/// 严格按投递顺序应用分类结论。
#[derive(Debug, Clone, Default)]
pub struct EpisodeTracker {
    policy: EpisodePolicy,
    state: DetectorState,
}

impl EpisodeTracker {
    pub fn new(policy: EpisodePolicy) -> Self {
        Self {
            policy,
            state: DetectorState::default(),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn policy(&self) -> &EpisodePolicy {
        &self.policy
    }

    /// ### English
    /// Explicit re-init: clears every counter, keeps the policy.
    ///
    /// ### 中文
    /// 显式重新初始化：清空所有计数，保留策略。
    pub fn reset(&mut self) {
        self.state = DetectorState::default();
    }

    /// ### English
    /// Feeds one verdict. Returns `Some(ResetSignal)` when the trigger count is reached.
    ///
    /// #### Parameters
    /// - `is_black`: Classifier verdict for the frame just delivered.
    ///
    /// ### 中文
    /// 输入一帧的结论；达到触发次数时返回 `Some(ResetSignal)`。
    ///
    /// #### 参数
    /// - `is_black`：刚投递帧的分类结论。
    pub fn observe(&mut self, is_black: bool) -> Option<ResetSignal> {
        let policy = self.policy;
        let state = &mut self.state;
        let mut signal = None;

        state.total_frames += 1;
        state.frames_since_last_episode = state.frames_since_last_episode.saturating_add(1);

        if is_black {
            state.black_run_length += 1;
            tracing::debug!(run = state.black_run_length, "black frame");

            if state.black_run_length > policy.screen_off_run {
                tracing::debug!(
                    run = state.black_run_length,
                    "sustained black frames, likely screen off; ignoring run"
                );
                state.black_run_length = 0;
                state.recent_episode_count = 0;
            }
        } else if state.black_run_length > 0 {
            let run = std::mem::take(&mut state.black_run_length);

            if policy.is_episode(run) {
                state.recent_episode_count += 1;
                state.frames_since_last_episode = 0;
                tracing::info!(
                    run,
                    episodes = state.recent_episode_count,
                    "blinking episode detected"
                );

                if state.recent_episode_count >= policy.trigger_episodes {
                    tracing::info!(
                        episodes = state.recent_episode_count,
                        "repeated blinking episodes, requesting video reset"
                    );
                    state.recent_episode_count = 0;
                    signal = Some(ResetSignal);
                }
            }
        }

        if state.frames_since_last_episode > policy.quiet_period_frames {
            if state.recent_episode_count > 0 {
                tracing::debug!("episode count expired after quiet period");
            }
            state.recent_episode_count = 0;
            state.frames_since_last_episode = 0;
        }

        signal
    }
}
