use super::{Profile, ProfileData};
use crate::types::{Segment, Waypoint, AMBIENT_START_TEMPERATURE, SECONDS_PER_MINUTE};
use log::{debug, warn};

/// Plottable waypoint form of a profile.
///
/// Waypoint profiles come back unchanged. Ramp-hold profiles start at
/// `(0, 68)` and every segment adds two points: the end of the ramp and the end
/// of the hold. Segment times are minutes, waypoint times are seconds.
pub fn to_waypoints(profile: &Profile) -> Vec<Waypoint> {
    match &profile.data {
        ProfileData::Waypoints(points) => points.clone(),
        ProfileData::RampHold(segments) => ramp_hold_to_waypoints(segments),
    }
}

pub fn ramp_hold_to_waypoints(segments: &[Segment]) -> Vec<Waypoint> {
    let mut points = Vec::with_capacity(2 * segments.len() + 1);
    let mut previous = Waypoint::new(0.0, AMBIENT_START_TEMPERATURE);
    points.push(previous);

    for (index, segment) in segments.iter().enumerate() {
        let ramp_s = ramp_seconds(segment, previous.temperature);
        let ramp_end = Waypoint::new(previous.time_s + ramp_s, segment.target_temperature);
        let hold_end = Waypoint::new(
            ramp_end.time_s + hold_seconds(segment),
            segment.target_temperature,
        );

        debug!(
            "Segment {}: ramp {:.1}s to {} then hold until {:.1}s",
            index, ramp_s, segment.target_temperature, hold_end.time_s
        );

        points.push(ramp_end);
        points.push(hold_end);
        previous = hold_end;
    }

    points
}

/// The segment's first field divides the temperature change; the quotient is in
/// minutes.
fn ramp_seconds(segment: &Segment, from_temperature: f64) -> f64 {
    let delta = (segment.target_temperature - from_temperature).abs();
    if delta == 0.0 {
        return 0.0;
    }
    if segment.duration_min <= 0.0 || !segment.duration_min.is_finite() {
        warn!(
            "Segment to {} has no usable ramp basis ({}), treating ramp as instantaneous",
            segment.target_temperature, segment.duration_min
        );
        return 0.0;
    }
    delta / segment.duration_min * SECONDS_PER_MINUTE
}

/// A negative or non-finite hold reads as no hold, so times never go backwards.
fn hold_seconds(segment: &Segment) -> f64 {
    if segment.hold_min < 0.0 || !segment.hold_min.is_finite() {
        warn!(
            "Segment to {} has an unusable hold ({}), treating it as zero",
            segment.target_temperature, segment.hold_min
        );
        return 0.0;
    }
    segment.hold_min * SECONDS_PER_MINUTE
}
