use std::ops::{Add, Mul};

use glam::{Quat, Vec3, Vec4};
use gltf::json::{self, animation::Property, validation::Checked};
use log::{debug, trace, warn};

use crate::{
    accessor::AccessorReader,
    diagnostics::Diagnostics,
    error::{ErrorKind, LoadError},
    node::Transform,
    skin::BoneSet,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationSampler {
    /// Accessor with keyframe times in seconds.
    pub input: usize,
    /// Accessor with keyframe values.
    pub output: usize,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationChannel {
    pub sampler: usize,
    /// Target node, `None` when the source refers to a node that does not
    /// exist. Such channels never change the pose.
    pub target: Option<usize>,
    pub path: AnimationPath,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnimationKeyFrames<T> {
    Linear(Vec<T>),
    Step(Vec<T>),
    // in, val, out
    CubicSpline(Vec<(T, T, T)>),
}

pub trait Interpolate: Copy {
    fn linear(a: Self, b: Self, t: f32) -> Self;
    fn cubic_spline(vk: Self, bk: Self, vk_1: Self, ak_1: Self, t: f32, td: f32) -> Self;
}

fn hermite<T>(vk: T, bk: T, vk_1: T, ak_1: T, t: f32, td: f32) -> T
where
    T: Mul<f32, Output = T> + Add<T, Output = T>,
{
    let t2 = t * t;
    let t3 = t2 * t;
    let first = vk * (2.0 * t3 - 3.0 * t2 + 1.0);
    let second = bk * (td * (t3 - 2.0 * t2 + t));
    let third = vk_1 * (-2.0 * t3 + 3.0 * t2);
    let forth = ak_1 * (td * (t3 - t2));
    first + second + third + forth
}

impl Interpolate for Vec3 {
    fn linear(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }

    fn cubic_spline(vk: Self, bk: Self, vk_1: Self, ak_1: Self, t: f32, td: f32) -> Self {
        hermite(vk, bk, vk_1, ak_1, t, td)
    }
}

impl Interpolate for Quat {
    fn linear(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }

    fn cubic_spline(vk: Self, bk: Self, vk_1: Self, ak_1: Self, t: f32, td: f32) -> Self {
        let value = hermite(
            Vec4::from(vk),
            Vec4::from(bk),
            Vec4::from(vk_1),
            Vec4::from(ak_1),
            t,
            td,
        );
        Quat::from_vec4(value).normalize()
    }
}

/// Find the keyframe interval containing `t`.
///
/// Returns the first `i` with `times[i] <= t < times[i + 1]` and the
/// interpolation factor inside that interval. Before the first keyframe the
/// result is `(0, 0.0)`, and past the last interval it is the last keyframe
/// with factor 0.
pub fn find_keyframe(times: &[f32], t: f32) -> (usize, f32) {
    let interval = times
        .windows(2)
        .position(|pair| pair[0] <= t && t < pair[1]);
    match interval {
        Some(index) => {
            let length = times[index + 1] - times[index];
            let factor = if length > 0.0 {
                (t - times[index]) / length
            } else {
                0.0
            };
            (index, factor)
        }
        None if times.first().map_or(true, |first| t < *first) => (0, 0.0),
        None => (times.len() - 1, 0.0),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack<T> {
    pub times: Vec<f32>,
    pub keyframes: AnimationKeyFrames<T>,
}

impl<T: Interpolate> KeyframeTrack<T> {
    fn new(
        times: &[f32],
        values: Vec<T>,
        interpolation: Interpolation,
    ) -> Result<Self, LoadError> {
        let expected = match interpolation {
            Interpolation::CubicSpline => times.len() * 3,
            _ => times.len(),
        };
        if values.len() < expected {
            return Err(LoadError::animation(format!(
                "{} keyframe values for {} keyframes",
                values.len(),
                times.len()
            )));
        }
        let keyframes = match interpolation {
            Interpolation::Linear => AnimationKeyFrames::Linear(values),
            Interpolation::Step => AnimationKeyFrames::Step(values),
            Interpolation::CubicSpline => AnimationKeyFrames::CubicSpline(
                values
                    .chunks_exact(3)
                    .map(|chunk| (chunk[0], chunk[1], chunk[2]))
                    .collect(),
            ),
        };
        Ok(Self {
            times: times.to_vec(),
            keyframes,
        })
    }

    pub fn sample(&self, t: f32) -> Option<T> {
        let (index, factor) = find_keyframe(&self.times, t);
        match &self.keyframes {
            AnimationKeyFrames::Step(values) => values.get(index).copied(),
            AnimationKeyFrames::Linear(values) => {
                let value = *values.get(index)?;
                if factor == 0.0 {
                    return Some(value);
                }
                let next = *values.get(index + 1)?;
                Some(T::linear(value, next, factor))
            }
            AnimationKeyFrames::CubicSpline(values) => {
                let (_, value, out_tangent) = *values.get(index)?;
                if factor == 0.0 {
                    return Some(value);
                }
                let (in_tangent, next, _) = *values.get(index + 1)?;
                let length = self.times[index + 1] - self.times[index];
                Some(T::cubic_spline(
                    value,
                    out_tangent,
                    next,
                    in_tangent,
                    factor,
                    length,
                ))
            }
        }
    }
}

/// Decoded keyframes of one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationTrack {
    Translation(KeyframeTrack<Vec3>),
    Rotation(KeyframeTrack<Quat>),
    Scale(KeyframeTrack<Vec3>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: Option<String>,
    pub samplers: Vec<AnimationSampler>,
    pub channels: Vec<AnimationChannel>,
    /// Largest last keyframe time over all samplers, in seconds.
    pub duration: f32,
    // Parallel to channels
    tracks: Vec<Option<AnimationTrack>>,
    error: Option<LoadError>,
}

impl Animation {
    /// Whether every sampler of the animation had a usable time track.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&LoadError> {
        self.error.as_ref()
    }

    pub fn track(&self, channel: usize) -> Option<&AnimationTrack> {
        self.tracks.get(channel).and_then(Option::as_ref)
    }

    /// Overwrite the bones in `pose` that are animated by this animation with
    /// their values at `time`.
    ///
    /// `pose` is indexed by bone index. Bones not targeted by any channel
    /// keep their value.
    pub fn sample(&self, time: f32, bones: &BoneSet, pose: &mut [Transform]) {
        for (channel, track) in self.channels.iter().zip(&self.tracks) {
            let (Some(target), Some(track)) = (channel.target, track) else {
                continue;
            };
            let Some(transform) = bones
                .bone_of_node(target)
                .and_then(|bone| pose.get_mut(bone))
            else {
                continue;
            };
            match track {
                AnimationTrack::Translation(track) => {
                    if let Some(translation) = track.sample(time) {
                        transform.translation = translation;
                    }
                }
                AnimationTrack::Rotation(track) => {
                    if let Some(rotation) = track.sample(time) {
                        transform.rotation = rotation;
                    }
                }
                AnimationTrack::Scale(track) => {
                    if let Some(scale) = track.sample(time) {
                        transform.scale = scale;
                    }
                }
            }
        }
        trace!("Sampled {} channels at {}", self.channels.len(), time);
    }
}

fn load_track(
    reader: &AccessorReader,
    sampler: &AnimationSampler,
    times: &[f32],
    path: AnimationPath,
) -> Result<Option<AnimationTrack>, LoadError> {
    let track = match path {
        AnimationPath::Translation => {
            let values = reader.read_vec3(sampler.output)?;
            let values = values.into_iter().map(Vec3::from_array).collect();
            AnimationTrack::Translation(KeyframeTrack::new(times, values, sampler.interpolation)?)
        }
        AnimationPath::Scale => {
            let values = reader.read_vec3(sampler.output)?;
            let values = values.into_iter().map(Vec3::from_array).collect();
            AnimationTrack::Scale(KeyframeTrack::new(times, values, sampler.interpolation)?)
        }
        AnimationPath::Rotation => {
            let values = reader.read_quat(sampler.output)?;
            AnimationTrack::Rotation(KeyframeTrack::new(times, values, sampler.interpolation)?)
        }
        AnimationPath::Weights => return Ok(None),
    };
    Ok(Some(track))
}

fn load_animation(
    reader: &AccessorReader,
    node_count: usize,
    index: usize,
    animation: &json::Animation,
) -> Animation {
    let samplers: Vec<AnimationSampler> = animation
        .samplers
        .iter()
        .map(|sampler| AnimationSampler {
            input: sampler.input.value(),
            output: sampler.output.value(),
            interpolation: match sampler.interpolation {
                Checked::Valid(json::animation::Interpolation::Step) => Interpolation::Step,
                Checked::Valid(json::animation::Interpolation::CubicSpline) => {
                    Interpolation::CubicSpline
                }
                _ => Interpolation::Linear,
            },
        })
        .collect();

    let channels: Vec<AnimationChannel> = animation
        .channels
        .iter()
        .map(|channel| {
            let target = channel.target.node.value();
            AnimationChannel {
                sampler: channel.sampler.value(),
                target: (target < node_count).then_some(target),
                path: match channel.target.path {
                    Checked::Valid(Property::Rotation) => AnimationPath::Rotation,
                    Checked::Valid(Property::Scale) => AnimationPath::Scale,
                    Checked::Valid(Property::MorphTargetWeights) => AnimationPath::Weights,
                    _ => AnimationPath::Translation,
                },
            }
        })
        .collect();

    let mut animation = Animation {
        name: animation.name.clone(),
        tracks: vec![None; channels.len()],
        samplers,
        channels,
        duration: 0.0,
        error: None,
    };

    let times: Result<Vec<Vec<f32>>, LoadError> = animation
        .samplers
        .iter()
        .enumerate()
        .map(|(sampler_index, sampler)| match reader.read_f32(sampler.input) {
            Ok(times) if times.is_empty() => Err(LoadError::animation(format!(
                "Sampler #{} has no keyframes",
                sampler_index
            ))),
            Ok(times) => Ok(times),
            Err(error) => Err(LoadError::animation(format!(
                "Sampler #{} has unreadable keyframe times: {}",
                sampler_index, error
            ))),
        })
        .collect();
    let times = match times {
        Ok(times) => times,
        Err(error) => {
            animation.error = Some(error);
            return animation;
        }
    };

    animation.duration = times
        .iter()
        .filter_map(|times| times.last().copied())
        .fold(0.0, f32::max);

    for (channel_index, channel) in animation.channels.iter().enumerate() {
        let Some((sampler, times)) = animation
            .samplers
            .get(channel.sampler)
            .zip(times.get(channel.sampler))
        else {
            warn!(
                "Channel #{} of animation #{} refers to unknown sampler #{}",
                channel_index, index, channel.sampler
            );
            continue;
        };
        match load_track(reader, sampler, times, channel.path) {
            Ok(track) => animation.tracks[channel_index] = track,
            Err(error) => warn!(
                "Skip channel #{} of animation #{}: {}",
                channel_index, index, error
            ),
        }
    }

    debug!(
        "Loaded animation #{} with {} channels, {} seconds",
        index,
        animation.channels.len(),
        animation.duration
    );
    animation
}

/// Convert every animation of the document.
///
/// An animation whose samplers lack usable times stays in the list, marked
/// invalid, so that animation indices match the source.
pub fn load_animations<D: Diagnostics>(
    root: &json::Root,
    reader: &AccessorReader,
    node_count: usize,
    diagnostics: &mut D,
) -> Vec<Animation> {
    root.animations
        .iter()
        .enumerate()
        .map(|(index, animation)| {
            let animation = load_animation(reader, node_count, index, animation);
            if let Some(error) = animation.error() {
                let message = format!("Failed to load animation #{}: {}", index, error);
                warn!("{}", message);
                diagnostics.resource_failed(ErrorKind::AnimationError, &message);
            }
            animation
        })
        .collect()
}
