use crate::constants::grid::EPSILON;
use crate::domain::{DomainSettings, DomainState};
use crate::emission::FieldBuffer;
use crate::sampler::{sample_source, SampleContext};
use crate::source::SourceObject;

/// Where the current sub-step sits within its frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTiming {
    pub frame: i32,
    pub dt: f32,
    pub time_per_frame: f32,
    pub frame_length: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameKind {
    /// Frame is the cache start frame
    pub is_first: bool,
    /// A paused data bake continues from this frame
    pub is_resume: bool,
}

impl FrameKind {
    pub fn new(frame: i32, frame_start: i32, pause_frame: i32) -> Self {
        Self {
            is_first: frame == frame_start,
            is_resume: pause_frame == frame,
        }
    }
}

/// Scene time (in frames) of sub-frame pass `subframe` out of `subframes + 1`
pub fn subframe_time(timing: StepTiming, subframe: i32, subframes: i32, subframe_dt: f32, is_first: bool) -> f32 {
    let inside_frame =
        subframe < subframes || timing.time_per_frame + timing.dt + EPSILON < timing.frame_length;
    if inside_frame && !is_first {
        let fraction =
            (timing.time_per_frame + (subframe as f32 + 1.0) * subframe_dt) / timing.frame_length;
        (timing.frame - 1) as f32 + fraction.clamp(0.0, 1.0)
    } else {
        timing.frame as f32
    }
}

/// Sample `source` over the sub-step, splitting it into the source's sub-frames.
///
/// `weighted` sub-frames contribute `1 / (subframes + 1)` each to additive
/// influence; effectors merge unweighted.
pub fn sample_with_subframes(
    source: &mut SourceObject,
    state: &DomainState,
    settings: &DomainSettings,
    timing: StepTiming,
    kind: FrameKind,
    additive: bool,
    weighted: bool,
) -> FieldBuffer {
    // no previous frame to interpolate from
    let subframes = if kind.is_first { 0 } else { source.subframes().max(0) };
    let sample_size = 1.0 / (subframes + 1) as f32;
    let subframe_dt = timing.dt * sample_size;
    let ctx = SampleContext::new(state, settings, subframe_dt, timing.frame);

    if subframes == 0 {
        let time = subframe_time(timing, 0, 0, subframe_dt, kind.is_first);
        return sample_source(source, &ctx, time);
    }

    let mut buffer = FieldBuffer::new();
    let weight = if weighted { sample_size } else { 0.0 };
    for subframe in 0..=subframes {
        let time = subframe_time(timing, subframe, subframes, subframe_dt, kind.is_first);
        let pass = sample_source(source, &ctx, time);
        buffer.combine(&pass, additive, weight);
    }
    buffer
}
