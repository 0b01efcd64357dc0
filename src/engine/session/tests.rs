use std::sync::Arc;
use std::time::Duration;

use dpi::PhysicalSize;

use crate::engine::config::RenderConfig;
use crate::engine::error::RenderError;
use crate::engine::frame::{IDENTITY_TRANSFORM, ImageFrame};
use crate::engine::gpu::testing::{
    FakeGpu, FakePlatform, GpuEvent, PanickingFilter, RecordingFilter, Step,
};
use crate::engine::runtime::{RenderWorker, WorkerMessage};

use super::{InputSurface, RenderSession, SessionPhase, SessionStats};

type Session = RenderSession<FakePlatform>;

const ACQUIRED: [GpuEvent; 10] = [
    GpuEvent::GetDisplay,
    GpuEvent::Initialize,
    GpuEvent::ChooseConfig,
    GpuEvent::CreateContext,
    GpuEvent::CreateSurface,
    GpuEvent::MakeCurrent,
    GpuEvent::LoadCommands,
    GpuEvent::CreateTexture(1),
    GpuEvent::CreateSampleTarget,
    GpuEvent::FilterInit,
];

fn input_size() -> PhysicalSize<u32> {
    PhysicalSize::new(32, 32)
}

fn output_size() -> PhysicalSize<u32> {
    PhysicalSize::new(1280, 720)
}

fn fixture() -> (Arc<FakeGpu>, RenderWorker<FakePlatform>) {
    let gpu = FakeGpu::new();
    let worker = RenderWorker::new(FakePlatform::new(&gpu));
    (gpu, worker)
}

fn start(
    gpu: &Arc<FakeGpu>,
    worker: &RenderWorker<FakePlatform>,
    config: RenderConfig,
) -> (Session, Arc<InputSurface>) {
    let mut session = Session::new(config);
    let input = session
        .start(
            worker,
            input_size(),
            output_size(),
            (),
            RecordingFilter::new(gpu),
        )
        .unwrap();
    (session, input)
}

/// RGBA frame whose first `dark` pixels are black and the rest light grey.
fn frame_with_dark_pixels(size: PhysicalSize<u32>, dark: usize, timestamp_ms: u64) -> ImageFrame {
    let total = (size.width * size.height) as usize;
    let mut pixels = Vec::with_capacity(total * 4);
    for index in 0..total {
        let value = if index < dark { 0 } else { 200 };
        pixels.extend_from_slice(&[value, value, value, 255]);
    }
    ImageFrame::new(size, pixels, Duration::from_millis(timestamp_ms))
}

fn black(timestamp_ms: u64) -> ImageFrame {
    frame_with_dark_pixels(input_size(), 1024, timestamp_ms)
}

fn bright(timestamp_ms: u64) -> ImageFrame {
    frame_with_dark_pixels(input_size(), 0, timestamp_ms)
}

fn draws(gpu: &FakeGpu) -> usize {
    gpu.count(|event| matches!(event, GpuEvent::FilterDraw { .. }))
}

fn swaps(gpu: &FakeGpu) -> usize {
    gpu.count(|event| matches!(event, GpuEvent::Swap(_)))
}

#[test]
fn start_acquires_resources_in_order() {
    let (gpu, worker) = fixture();
    let (session, input) = start(&gpu, &worker, RenderConfig::default());

    assert_eq!(session.phase(), SessionPhase::Running);
    assert_eq!(input.size(), input_size());
    assert_eq!(gpu.events(), ACQUIRED);
}

#[test]
fn black_texture_is_never_presented() {
    let (gpu, worker) = fixture();
    let (session, input) = start(&gpu, &worker, RenderConfig::default());
    gpu.clear();

    input.submit(black(16)).unwrap();
    worker.sync().unwrap();

    assert_eq!(
        gpu.events(),
        [
            GpuEvent::MakeCurrent,
            GpuEvent::Viewport(output_size()),
            GpuEvent::Upload { reallocate: false },
            GpuEvent::ReadSample,
        ]
    );
    assert_eq!(
        session.stats(),
        SessionStats {
            frames_presented: 0,
            frames_discarded: 1,
            empty_notifications: 0,
        }
    );
}

#[test]
fn content_is_drawn_then_swapped_with_its_timestamp() {
    let (gpu, worker) = fixture();
    let (session, input) = start(&gpu, &worker, RenderConfig::default());
    gpu.clear();

    input.submit(bright(33)).unwrap();
    worker.sync().unwrap();

    assert_eq!(
        gpu.events(),
        [
            GpuEvent::MakeCurrent,
            GpuEvent::Viewport(output_size()),
            GpuEvent::Upload { reallocate: false },
            GpuEvent::ReadSample,
            GpuEvent::FilterDraw {
                texture: 1,
                transform: IDENTITY_TRANSFORM,
            },
            GpuEvent::Swap(Duration::from_millis(33)),
        ]
    );
    assert_eq!(session.stats().frames_presented, 1);
}

#[test]
fn dark_ratio_threshold_on_a_32x32_sample() {
    let (gpu, worker) = fixture();
    let (session, input) = start(&gpu, &worker, RenderConfig::default());

    // 973 / 1024 is just above 95%.
    input
        .submit(frame_with_dark_pixels(input_size(), 973, 1))
        .unwrap();
    worker.sync().unwrap();
    assert_eq!(draws(&gpu), 0);
    assert_eq!(swaps(&gpu), 0);

    input
        .submit(frame_with_dark_pixels(input_size(), 972, 2))
        .unwrap();
    worker.sync().unwrap();
    assert_eq!(draws(&gpu), 1);
    assert_eq!(swaps(&gpu), 1);

    let stats = session.stats();
    assert_eq!(stats.frames_discarded, 1);
    assert_eq!(stats.frames_presented, 1);
}

#[test]
fn larger_frames_are_downsampled_to_the_fixed_sample() {
    let (gpu, worker) = fixture();
    let (session, input) = start(&gpu, &worker, RenderConfig::default());

    let size = PhysicalSize::new(640, 480);
    input
        .submit(frame_with_dark_pixels(size, 640 * 480, 1))
        .unwrap();
    worker.sync().unwrap();
    assert_eq!(session.stats().frames_discarded, 1);
    assert!(gpu.events().contains(&GpuEvent::Upload { reallocate: true }));

    input.submit(frame_with_dark_pixels(size, 0, 2)).unwrap();
    worker.sync().unwrap();
    assert_eq!(session.stats().frames_presented, 1);
    assert_eq!(
        gpu.count(|event| *event == GpuEvent::Upload { reallocate: true }),
        1
    );
}

#[test]
fn discard_switch_is_applied_from_the_next_notification() {
    let (gpu, worker) = fixture();
    let (session, input) = start(&gpu, &worker, RenderConfig::default());

    session.set_discard_black_textures(false);
    session.set_discard_black_textures(false);
    assert!(!session.discard_black_textures());

    input.submit(black(1)).unwrap();
    worker.sync().unwrap();
    assert_eq!(draws(&gpu), 1);
    assert_eq!(gpu.count(|event| *event == GpuEvent::ReadSample), 0);

    session.set_discard_black_textures(true);
    input.submit(black(2)).unwrap();
    worker.sync().unwrap();
    assert_eq!(draws(&gpu), 1);
    assert_eq!(session.stats().frames_discarded, 1);
}

#[test]
fn configured_transform_overrides_the_frame_transform() {
    let mut rotated = IDENTITY_TRANSFORM;
    rotated[0] = 0.0;
    rotated[1] = 1.0;
    rotated[4] = -1.0;
    rotated[5] = 0.0;

    let (gpu, worker) = fixture();
    let (_session, input) = start(&gpu, &worker, RenderConfig::default());
    let mut flipped = IDENTITY_TRANSFORM;
    flipped[5] = -1.0;
    input.submit(bright(1).with_transform(flipped)).unwrap();
    worker.sync().unwrap();
    assert!(gpu.events().contains(&GpuEvent::FilterDraw {
        texture: 1,
        transform: flipped,
    }));

    let (gpu, worker) = fixture();
    let config = RenderConfig {
        override_transform: Some(rotated),
        ..RenderConfig::default()
    };
    let (_session, input) = start(&gpu, &worker, config);
    input.submit(bright(1).with_transform(flipped)).unwrap();
    worker.sync().unwrap();
    assert!(gpu.events().contains(&GpuEvent::FilterDraw {
        texture: 1,
        transform: rotated,
    }));
}

#[test]
fn notification_without_an_image_is_counted() {
    let (gpu, worker) = fixture();
    let (session, _input) = start(&gpu, &worker, RenderConfig::default());
    let id = session.id().unwrap();

    worker
        .sender()
        .unwrap()
        .send(WorkerMessage::FrameAvailable { id })
        .unwrap_or_else(|_| panic!("worker gone"));
    worker.sync().unwrap();

    assert_eq!(session.stats().empty_notifications, 1);
    assert_eq!(draws(&gpu), 0);
}

#[test]
fn stop_releases_in_reverse_order_and_blocks_until_done() {
    let (gpu, worker) = fixture();
    let (mut session, input) = start(&gpu, &worker, RenderConfig::default());
    gpu.clear();

    session.stop_and_release();

    assert_eq!(session.phase(), SessionPhase::Stopped);
    assert_eq!(
        gpu.events(),
        [
            GpuEvent::MakeCurrent,
            GpuEvent::FilterRelease,
            GpuEvent::DeleteSampleTarget,
            GpuEvent::DeleteTexture(1),
            GpuEvent::DestroySurface,
            GpuEvent::DestroyContext,
            GpuEvent::Terminate,
        ]
    );
    assert!(input.is_released());
    assert!(input.submit(bright(1)).is_err());

    session.stop_and_release();
    assert_eq!(gpu.count(|event| *event == GpuEvent::Terminate), 1);
}

#[test]
fn late_notification_after_stop_is_a_no_op() {
    let (gpu, worker) = fixture();
    let (mut session, _input) = start(&gpu, &worker, RenderConfig::default());
    let id = session.id().unwrap();
    session.stop_and_release();
    gpu.clear();

    worker
        .sender()
        .unwrap()
        .send(WorkerMessage::FrameAvailable { id })
        .unwrap_or_else(|_| panic!("worker gone"));
    worker.sync().unwrap();

    assert!(gpu.events().is_empty());
}

/// Each acquisition step, how many events precede it, and the cleanup expected after it.
const UNWIND_CASES: [(Step, usize, &[GpuEvent]); 10] = [
    (Step::GetDisplay, 0, &[]),
    (Step::Initialize, 1, &[GpuEvent::Terminate]),
    (Step::ChooseConfig, 2, &[GpuEvent::Terminate]),
    (Step::CreateContext, 3, &[GpuEvent::Terminate]),
    (
        Step::CreateSurface,
        4,
        &[GpuEvent::DestroyContext, GpuEvent::Terminate],
    ),
    (
        Step::MakeCurrent,
        5,
        &[
            GpuEvent::DestroySurface,
            GpuEvent::DestroyContext,
            GpuEvent::Terminate,
        ],
    ),
    (
        Step::LoadCommands,
        6,
        &[
            GpuEvent::DestroySurface,
            GpuEvent::DestroyContext,
            GpuEvent::Terminate,
        ],
    ),
    (
        Step::CreateTexture,
        7,
        &[
            GpuEvent::DestroySurface,
            GpuEvent::DestroyContext,
            GpuEvent::Terminate,
        ],
    ),
    (
        Step::CreateSampleTarget,
        8,
        &[
            GpuEvent::DeleteTexture(1),
            GpuEvent::DestroySurface,
            GpuEvent::DestroyContext,
            GpuEvent::Terminate,
        ],
    ),
    (
        Step::FilterInit,
        9,
        &[
            GpuEvent::DeleteSampleTarget,
            GpuEvent::DeleteTexture(1),
            GpuEvent::DestroySurface,
            GpuEvent::DestroyContext,
            GpuEvent::Terminate,
        ],
    ),
];

fn fails_with_step_error(step: Step, err: &RenderError) -> bool {
    match step {
        Step::GetDisplay => matches!(err, RenderError::DisplayUnavailable(_)),
        Step::ChooseConfig => matches!(err, RenderError::NoMatchingConfiguration(_)),
        Step::CreateContext => matches!(err, RenderError::ContextCreationFailed(_)),
        Step::CreateSurface => matches!(err, RenderError::SurfaceCreationFailed(_)),
        Step::MakeCurrent => matches!(err, RenderError::MakeCurrentFailed(_)),
        Step::CreateTexture | Step::CreateSampleTarget => {
            matches!(err, RenderError::GraphicsApiError(_))
        }
        Step::Initialize | Step::LoadCommands => {
            matches!(err, RenderError::InitializationFailed { .. })
        }
        Step::FilterInit => matches!(
            err,
            RenderError::InitializationFailed {
                source: Some(_),
                ..
            }
        ),
    }
}

fn start_with_default_filter(
    gpu: &Arc<FakeGpu>,
    worker: &RenderWorker<FakePlatform>,
    session: &mut Session,
) -> Result<Arc<InputSurface>, RenderError> {
    session.start(
        worker,
        input_size(),
        output_size(),
        (),
        RecordingFilter::new(gpu),
    )
}

#[test]
fn every_failed_step_unwinds_what_was_acquired() {
    for (step, acquired, cleanup) in UNWIND_CASES {
        let (gpu, worker) = fixture();
        gpu.fail_once(step);

        let mut session = Session::new(RenderConfig::default());
        let err = start_with_default_filter(&gpu, &worker, &mut session).unwrap_err();

        assert!(
            fails_with_step_error(step, &err),
            "{step:?}: unexpected error {err:?}"
        );
        assert_eq!(session.phase(), SessionPhase::Stopped, "{step:?}");

        let mut expected = ACQUIRED[..acquired].to_vec();
        expected.extend_from_slice(cleanup);
        assert_eq!(gpu.events(), expected, "{step:?}");
    }
}

#[test]
fn panic_at_every_step_unwinds_what_was_acquired() {
    for (step, acquired, cleanup) in UNWIND_CASES {
        let (gpu, worker) = fixture();
        gpu.panic_once(step);

        let mut session = Session::new(RenderConfig::default());
        let err = start_with_default_filter(&gpu, &worker, &mut session).unwrap_err();

        let RenderError::InitializationFailed {
            source: Some(source),
            ..
        } = &err
        else {
            panic!("{step:?}: unexpected error {err:?}");
        };
        assert!(
            source.to_string().contains(&format!("{step:?}")),
            "{step:?}: {source}"
        );

        let mut expected = ACQUIRED[..acquired].to_vec();
        expected.extend_from_slice(cleanup);
        assert_eq!(gpu.events(), expected, "{step:?}");

        worker.sync().unwrap();
        assert!(worker.is_running(), "{step:?}");
    }
}

#[test]
fn fresh_session_starts_after_configuration_failure() {
    let (gpu, worker) = fixture();
    gpu.fail_once(Step::ChooseConfig);

    let mut failed = Session::new(RenderConfig::default());
    let err = failed
        .start(
            &worker,
            input_size(),
            output_size(),
            (),
            RecordingFilter::new(&gpu),
        )
        .unwrap_err();
    assert!(matches!(err, RenderError::NoMatchingConfiguration(_)));

    let retry = failed.start(
        &worker,
        input_size(),
        output_size(),
        (),
        RecordingFilter::new(&gpu),
    );
    assert!(matches!(retry, Err(RenderError::InvalidState(_))));

    gpu.clear();
    let (session, input) = start(&gpu, &worker, RenderConfig::default());
    assert_eq!(session.phase(), SessionPhase::Running);
    assert_eq!(gpu.events(), ACQUIRED);

    input.submit(bright(1)).unwrap();
    worker.sync().unwrap();
    assert_eq!(session.stats().frames_presented, 1);
}

#[test]
fn zero_sized_start_is_rejected_without_touching_the_gpu() {
    let (gpu, worker) = fixture();
    let mut session = Session::new(RenderConfig::default());
    let err = session
        .start(
            &worker,
            PhysicalSize::new(0, 32),
            output_size(),
            (),
            RecordingFilter::new(&gpu),
        )
        .unwrap_err();

    assert!(matches!(err, RenderError::InitializationFailed { .. }));
    assert!(gpu.events().is_empty());
    assert!(!worker.is_running());
}

#[test]
fn panic_during_start_is_reported_and_the_worker_survives() {
    let (gpu, worker) = fixture();
    gpu.panic_once(Step::GetDisplay);

    let mut session = Session::new(RenderConfig::default());
    let err = session
        .start(
            &worker,
            input_size(),
            output_size(),
            (),
            RecordingFilter::new(&gpu),
        )
        .unwrap_err();
    assert!(matches!(err, RenderError::InitializationFailed { .. }));

    let (session, _input) = start(&gpu, &worker, RenderConfig::default());
    assert_eq!(session.phase(), SessionPhase::Running);
}

#[test]
fn graphics_error_faults_the_session_without_retry() {
    let (gpu, worker) = fixture();
    let (mut session, input) = start(&gpu, &worker, RenderConfig::default());

    gpu.inject_gl_error();
    input.submit(bright(1)).unwrap();
    worker.sync().unwrap();

    assert!(session.is_faulted());
    assert!(session.fault().unwrap().contains("GL error"));
    assert_eq!(draws(&gpu), 0);

    input.submit(bright(2)).unwrap();
    worker.sync().unwrap();
    assert_eq!(draws(&gpu), 0);
    assert_eq!(session.stats().frames_presented, 0);

    session.stop_and_release();
    assert_eq!(gpu.count(|event| *event == GpuEvent::Terminate), 1);
}

#[test]
fn dropping_a_running_session_releases_it() {
    let (gpu, worker) = fixture();
    let (session, input) = start(&gpu, &worker, RenderConfig::default());
    drop(session);

    assert!(input.is_released());
    assert_eq!(gpu.count(|event| *event == GpuEvent::Terminate), 1);
}

#[test]
fn start_after_worker_quit_fails_fast() {
    let (gpu, worker) = fixture();
    worker.quit();
    worker.join().unwrap();

    let mut session = Session::new(RenderConfig::default());
    let err = session
        .start(
            &worker,
            input_size(),
            output_size(),
            (),
            RecordingFilter::new(&gpu),
        )
        .unwrap_err();
    assert!(matches!(err, RenderError::WorkerQuit));
    assert_eq!(session.phase(), SessionPhase::Stopped);
    assert!(gpu.events().is_empty());
}

#[test]
fn worker_quit_releases_sessions_still_running() {
    let (gpu, worker) = fixture();
    let (mut session, input) = start(&gpu, &worker, RenderConfig::default());

    worker.quit();
    worker.join().unwrap();

    assert!(input.is_released());
    assert_eq!(gpu.count(|event| *event == GpuEvent::Terminate), 1);

    session.stop_and_release();
    assert_eq!(session.phase(), SessionPhase::Stopped);
    assert_eq!(gpu.count(|event| *event == GpuEvent::Terminate), 1);
}

#[test]
fn sessions_on_one_worker_are_independent() {
    let (gpu, worker) = fixture();
    let (first, first_input) = start(&gpu, &worker, RenderConfig::default());
    let (mut second, second_input) = start(&gpu, &worker, RenderConfig::default());

    second.stop_and_release();
    first_input.submit(bright(1)).unwrap();
    worker.sync().unwrap();

    assert_eq!(first.stats().frames_presented, 1);
    assert!(second_input.is_released());
    assert!(!first_input.is_released());
}

#[test]
fn panicking_filter_faults_only_its_own_session() {
    let (gpu, worker) = fixture();
    let (healthy, healthy_input) = start(&gpu, &worker, RenderConfig::default());

    let mut faulty = Session::new(RenderConfig::default());
    let faulty_input = faulty
        .start(
            &worker,
            input_size(),
            output_size(),
            (),
            PanickingFilter::new(&gpu),
        )
        .unwrap();

    faulty_input.submit(bright(1)).unwrap();
    healthy_input.submit(bright(1)).unwrap();
    worker.sync().unwrap();

    assert!(worker.is_running());
    assert!(faulty.is_faulted());
    assert!(faulty.fault().unwrap().contains("filter draw exploded"));
    assert!(!healthy.is_faulted());
    assert_eq!(healthy.stats().frames_presented, 1);

    faulty_input.submit(bright(2)).unwrap();
    healthy_input.submit(bright(2)).unwrap();
    worker.sync().unwrap();
    assert_eq!(healthy.stats().frames_presented, 2);
    assert_eq!(faulty.stats().frames_presented, 0);

    let (fresh, _fresh_input) = start(&gpu, &worker, RenderConfig::default());
    assert_eq!(fresh.phase(), SessionPhase::Running);

    faulty.stop_and_release();
    assert!(faulty_input.is_released());
    assert_eq!(gpu.count(|event| *event == GpuEvent::Terminate), 1);
}

#[test]
fn invalid_render_config_is_rejected_before_the_worker_starts() {
    let (gpu, worker) = fixture();
    let mut session = Session::new(RenderConfig {
        sample_size: 0,
        ..RenderConfig::default()
    });

    let err = start_with_default_filter(&gpu, &worker, &mut session).unwrap_err();

    assert!(matches!(
        err,
        RenderError::InitializationFailed {
            source: Some(_),
            ..
        }
    ));
    assert_eq!(session.phase(), SessionPhase::Stopped);
    assert!(gpu.events().is_empty());
    assert!(!worker.is_running());
}
