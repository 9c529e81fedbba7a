use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::AnimationError;

/// A value that can be stored in a keyframe channel.
pub trait KeyValue: Copy {
    /// Returned by a channel with no keys.
    const IDENTITY: Self;

    fn interpolate(from: Self, to: Self, factor: f32) -> Self;

    fn is_finite(&self) -> bool;
}

impl KeyValue for Vec3 {
    const IDENTITY: Self = Vec3::ZERO;

    fn interpolate(from: Self, to: Self, factor: f32) -> Self {
        from.lerp(to, factor)
    }

    fn is_finite(&self) -> bool {
        Vec3::is_finite(*self)
    }
}

impl KeyValue for Quat {
    const IDENTITY: Self = Quat::IDENTITY;

    fn interpolate(from: Self, to: Self, factor: f32) -> Self {
        from.slerp(to, factor)
    }

    fn is_finite(&self) -> bool {
        Quat::is_finite(*self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
}
impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum KeyDefect {
    NotAscending { index: usize, time: f32 },
    NonFinite { index: usize },
}

/// Time-sorted samples of one channel. Times are strictly ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframes<T> {
    times: Box<[f32]>,
    values: Box<[T]>,
}

impl<T: KeyValue> Keyframes<T> {
    pub fn empty() -> Self {
        Self {
            times: Box::new([]),
            values: Box::new([]),
        }
    }

    pub(crate) fn from_keys(keys: impl IntoIterator<Item = Keyframe<T>>) -> Result<Self, KeyDefect> {
        let mut times = Vec::new();
        let mut values = Vec::new();
        for (index, key) in keys.into_iter().enumerate() {
            if !key.time.is_finite() || !key.value.is_finite() {
                return Err(KeyDefect::NonFinite { index });
            }
            // equal timestamps would give a zero-length segment
            if let Some(&prev) = times.last() {
                if key.time <= prev {
                    return Err(KeyDefect::NotAscending { index, time: key.time });
                }
            }
            times.push(key.time);
            values.push(key.value);
        }
        Ok(Self {
            times: times.into_boxed_slice(),
            values: values.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn last_time(&self) -> Option<f32> {
        self.times.last().copied()
    }

    /// Bracketing key pair and normalized factor for `time`.
    ///
    /// Requires at least two keys. Times past either end clamp to the
    /// first/last segment and hold that end's value.
    pub fn segment(&self, time: f32) -> (usize, usize, f32) {
        let n = self.times.len();
        assert!(n >= 2, "segment lookup needs at least two keys, got {n}");
        debug_assert!(time.is_finite(), "sample time must be finite, got {time}");

        // first key strictly after `time`
        let next = self.times.partition_point(|&t| t <= time).clamp(1, n - 1);
        let (i0, i1) = (next - 1, next);
        let (t0, t1) = (self.times[i0], self.times[i1]);
        let factor = ((time - t0) / (t1 - t0)).clamp(0.0, 1.0);
        debug_assert!((0.0..=1.0).contains(&factor));
        (i0, i1, factor)
    }

    pub fn sample(&self, time: f32) -> T {
        match self.values.len() {
            0 => T::IDENTITY,
            1 => self.values[0],
            _ => {
                let (i0, i1, factor) = self.segment(time);
                T::interpolate(self.values[i0], self.values[i1], factor)
            }
        }
    }
}

impl<T: KeyValue> Default for Keyframes<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Position and rotation samples driving a single bone.
///
/// Scale is not animated; bones are assumed not to scale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyframeTrack {
    positions: Keyframes<Vec3>,
    rotations: Keyframes<Quat>,
}

impl KeyframeTrack {
    pub fn new(
        bone: &str,
        positions: impl IntoIterator<Item = Keyframe<Vec3>>,
        rotations: impl IntoIterator<Item = Keyframe<Quat>>,
    ) -> Result<Self, AnimationError> {
        Ok(Self {
            positions: validated::<Vec3>(bone, positions)?,
            rotations: validated::<Quat>(bone, rotations)?,
        })
    }

    pub fn positions(&self) -> &Keyframes<Vec3> {
        &self.positions
    }

    pub fn rotations(&self) -> &Keyframes<Quat> {
        &self.rotations
    }

    /// Latest timestamp across both channels.
    pub fn end_time(&self) -> f32 {
        self.positions
            .last_time()
            .unwrap_or(0.0)
            .max(self.rotations.last_time().unwrap_or(0.0))
    }

    pub fn interpolate<T: TrackChannel>(&self, time: f32) -> T {
        T::keys(self).sample(time)
    }
}

/// Selects the channel of a [`KeyframeTrack`] holding values of `Self`.
pub trait TrackChannel: KeyValue {
    const CHANNEL: &'static str;

    fn keys(track: &KeyframeTrack) -> &Keyframes<Self>;
}

impl TrackChannel for Vec3 {
    const CHANNEL: &'static str = "position";

    fn keys(track: &KeyframeTrack) -> &Keyframes<Self> {
        &track.positions
    }
}

impl TrackChannel for Quat {
    const CHANNEL: &'static str = "rotation";

    fn keys(track: &KeyframeTrack) -> &Keyframes<Self> {
        &track.rotations
    }
}

fn validated<T: TrackChannel>(
    bone: &str,
    keys: impl IntoIterator<Item = Keyframe<T>>,
) -> Result<Keyframes<T>, AnimationError> {
    Keyframes::from_keys(keys).map_err(|defect| match defect {
        KeyDefect::NotAscending { index, time } => AnimationError::NonAscendingKeyframes {
            bone: bone.to_string(),
            channel: T::CHANNEL,
            index,
            time,
        },
        KeyDefect::NonFinite { index } => AnimationError::NonFiniteKeyframe {
            bone: bone.to_string(),
            channel: T::CHANNEL,
            index,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn vec_keys(keys: &[(f32, Vec3)]) -> Keyframes<Vec3> {
        Keyframes::from_keys(keys.iter().map(|&(t, v)| Keyframe::new(t, v))).unwrap()
    }

    #[test]
    fn empty_channels_return_identity() {
        let track = KeyframeTrack::default();
        assert_eq!(track.interpolate::<Vec3>(3.0), Vec3::ZERO);
        assert_eq!(track.interpolate::<Quat>(3.0), Quat::IDENTITY);
    }

    #[test_case(0.5, 0.5 ; "midpoint of first segment")]
    #[test_case(1.0, 1.0 ; "exactly at middle key")]
    #[test_case(1.5, 1.5 ; "inside second segment")]
    #[test_case(2.0, 2.0 ; "exactly at last key")]
    #[test_case(7.0, 2.0 ; "past the end holds last value")]
    #[test_case(-3.0, 0.0 ; "before the start holds first value")]
    fn linear_position_lookup(time: f32, expected_x: f32) {
        let keys = vec_keys(&[
            (0.0, Vec3::ZERO),
            (1.0, Vec3::X),
            (2.0, Vec3::X * 2.0),
        ]);
        let v = keys.sample(time);
        assert!((v.x - expected_x).abs() < 1e-6, "t={time}: {v}");
    }

    #[test]
    fn segment_past_end_clamps_to_last_pair() {
        let keys = vec_keys(&[(0.0, Vec3::ZERO), (1.0, Vec3::X), (4.0, Vec3::Y)]);
        assert_eq!(keys.segment(10.0), (1, 2, 1.0));
        assert_eq!(keys.segment(0.0), (0, 1, 0.0));
        assert_eq!(keys.segment(2.5), (1, 2, 0.5));
    }

    #[test]
    fn rotation_uses_slerp() {
        let end = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let track = KeyframeTrack::new(
            "bone",
            [],
            [Keyframe::new(0.0, Quat::IDENTITY), Keyframe::new(10.0, end)],
        )
        .unwrap();
        let half: Quat = track.interpolate(5.0);
        assert!(half.abs_diff_eq(Quat::from_rotation_z(std::f32::consts::FRAC_PI_4), 1e-5));
        assert!((half.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn duplicate_timestamps_are_rejected() {
        let err = KeyframeTrack::new(
            "hip",
            [Keyframe::new(0.0, Vec3::ZERO), Keyframe::new(0.0, Vec3::X)],
            [],
        )
        .unwrap_err();
        assert_eq!(
            err,
            AnimationError::NonAscendingKeyframes {
                bone: "hip".to_string(),
                channel: "position",
                index: 1,
                time: 0.0,
            }
        );
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let err = KeyframeTrack::new(
            "hip",
            [],
            [Keyframe::new(0.0, Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0))],
        )
        .unwrap_err();
        assert!(matches!(err, AnimationError::NonFiniteKeyframe { channel: "rotation", index: 0, .. }));
    }

    #[test]
    fn end_time_spans_both_channels() {
        let track = KeyframeTrack::new(
            "b",
            [Keyframe::new(0.0, Vec3::ZERO), Keyframe::new(3.0, Vec3::X)],
            [Keyframe::new(0.0, Quat::IDENTITY), Keyframe::new(8.0, Quat::IDENTITY)],
        )
        .unwrap();
        assert_eq!(track.end_time(), 8.0);
    }

    fn ascending_keys() -> impl Strategy<Value = Vec<(f32, Vec3)>> {
        prop::collection::vec((0.01f32..10.0, -100.0f32..100.0, -100.0f32..100.0, -100.0f32..100.0), 2..12)
            .prop_map(|steps| {
                let mut t = 0.0;
                steps
                    .into_iter()
                    .map(|(dt, x, y, z)| {
                        t += dt;
                        (t, Vec3::new(x, y, z))
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn single_key_is_constant(t in -1000.0f32..1000.0, x in -10.0f32..10.0) {
            let keys = vec_keys(&[(4.0, Vec3::new(x, 1.0, 2.0))]);
            prop_assert_eq!(keys.sample(t), Vec3::new(x, 1.0, 2.0));
        }

        #[test]
        fn sampling_at_a_key_returns_its_value(keys in ascending_keys()) {
            let track = vec_keys(&keys);
            for (t, v) in &keys {
                let got = track.sample(*t);
                prop_assert!(got.abs_diff_eq(*v, 1e-3), "t={} expected {} got {}", t, v, got);
            }
        }

        #[test]
        fn samples_stay_on_segment_path(keys in ascending_keys(), a in 0.0f32..0.99, b in 0.0f32..0.99) {
            let track = vec_keys(&keys);
            let (t0, v0) = keys[0];
            let (t1, v1) = keys[1];
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let mut factors = vec![];
            for f in [lo, hi] {
                let t = t0 + (t1 - t0) * f;
                let (i0, i1, factor) = track.segment(t);
                prop_assert_eq!((i0, i1), (0, 1));
                prop_assert!(track.sample(t).abs_diff_eq(v0.lerp(v1, factor), 1e-3));
                factors.push(factor);
            }
            prop_assert!(factors[0] <= factors[1]);
        }
    }
}
