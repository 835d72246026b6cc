//! Geometric posture classification
//!
//! This module computes a per-frame posture verdict from pose keypoints:
//! the spine vector from the shoulder midpoint to the hip midpoint is compared
//! against vertical, and a deviation beyond the configured threshold is Wrong.
//!
//! Classification is a pure function of its inputs. Anything that prevents the
//! computation (undetected landmarks, truncated keypoint sets, non-finite
//! coordinates) degrades to `Unknown` instead of erroring.

use crate::types::{Classification, Keypoint, PostureStatus};

/// Keypoint indices in the pose model's body schema
pub const RIGHT_SHOULDER: usize = 2;
pub const LEFT_SHOULDER: usize = 5;
pub const RIGHT_HIP: usize = 9;
pub const LEFT_HIP: usize = 12;

/// Default spine-tilt tolerance in degrees
pub const DEFAULT_ANGLE_THRESHOLD_DEG: f64 = 20.0;

/// Classifier for the spine-tilt angle of a seated person
#[derive(Debug, Clone, Copy)]
pub struct SpineClassifier {
    angle_threshold_deg: f64,
}

impl Default for SpineClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ANGLE_THRESHOLD_DEG)
    }
}

impl SpineClassifier {
    pub fn new(angle_threshold_deg: f64) -> Self {
        Self {
            angle_threshold_deg,
        }
    }

    pub fn angle_threshold_deg(&self) -> f64 {
        self.angle_threshold_deg
    }

    /// Classify one frame's keypoints.
    ///
    /// Requires both shoulders and both hips; any undetected landmark yields
    /// `Unknown` with no deviation or confidence.
    pub fn classify(&self, keypoints: &[Keypoint]) -> Classification {
        let required = [
            keypoints.get(LEFT_SHOULDER),
            keypoints.get(RIGHT_SHOULDER),
            keypoints.get(LEFT_HIP),
            keypoints.get(RIGHT_HIP),
        ];

        let [shoulder_left, shoulder_right, hip_left, hip_right] = match required {
            [Some(a), Some(b), Some(c), Some(d)]
                if a.is_detected() && b.is_detected() && c.is_detected() && d.is_detected() =>
            {
                [a, b, c, d]
            }
            _ => return Classification::unknown(),
        };

        let confidence = (shoulder_left.confidence
            + shoulder_right.confidence
            + hip_left.confidence
            + hip_right.confidence)
            / 4.0;

        let shoulder_mid = midpoint(shoulder_left, shoulder_right);
        let hip_mid = midpoint(hip_left, hip_right);

        // Angle from vertical: atan2 of the horizontal over the vertical span
        let delta_x = hip_mid.0 - shoulder_mid.0;
        let delta_y = hip_mid.1 - shoulder_mid.1;
        let deviation = delta_x.atan2(delta_y).to_degrees().abs();

        if !deviation.is_finite() || !confidence.is_finite() {
            return Classification::unknown();
        }

        let status = if deviation <= self.angle_threshold_deg {
            PostureStatus::Correct
        } else {
            PostureStatus::Wrong
        };

        Classification {
            status,
            deviation_degrees: Some(deviation),
            confidence: Some(confidence),
        }
    }
}

fn midpoint(a: &Keypoint, b: &Keypoint) -> (f64, f64) {
    ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a full keypoint set with the four torso landmarks placed explicitly
    fn torso(
        shoulder_left: [f64; 3],
        shoulder_right: [f64; 3],
        hip_left: [f64; 3],
        hip_right: [f64; 3],
    ) -> Vec<Keypoint> {
        let mut kps = vec![Keypoint::new(0.0, 0.0, 0.0); 25];
        kps[LEFT_SHOULDER] = shoulder_left.into();
        kps[RIGHT_SHOULDER] = shoulder_right.into();
        kps[LEFT_HIP] = hip_left.into();
        kps[RIGHT_HIP] = hip_right.into();
        kps
    }

    #[test]
    fn vertical_spine_is_correct_with_zero_deviation() {
        let kps = torso(
            [120.0, 100.0, 0.9],
            [80.0, 100.0, 0.8],
            [120.0, 300.0, 0.7],
            [80.0, 300.0, 0.6],
        );
        let result = SpineClassifier::default().classify(&kps);

        assert_eq!(result.status, PostureStatus::Correct);
        assert!(result.deviation_degrees.unwrap().abs() < 1e-9);
        assert!((result.confidence.unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn vertical_spine_is_correct_even_at_zero_threshold() {
        let kps = torso(
            [100.0, 100.0, 0.9],
            [100.0, 100.0, 0.9],
            [100.0, 300.0, 0.9],
            [100.0, 300.0, 0.9],
        );
        let result = SpineClassifier::new(0.0).classify(&kps);
        assert_eq!(result.status, PostureStatus::Correct);
    }

    #[test]
    fn tilted_spine_beyond_threshold_is_wrong() {
        // Hips offset 200px sideways over a 200px drop: 45 degrees from vertical
        let kps = torso(
            [120.0, 100.0, 0.9],
            [80.0, 100.0, 0.9],
            [320.0, 300.0, 0.9],
            [280.0, 300.0, 0.9],
        );
        let result = SpineClassifier::default().classify(&kps);

        assert_eq!(result.status, PostureStatus::Wrong);
        assert!((result.deviation_degrees.unwrap() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn deviation_at_exact_threshold_is_still_correct() {
        // tan(20 deg) * 200 horizontal offset over 200 vertical drop
        let dx = (20.0_f64).to_radians().tan() * 200.0;
        let kps = torso(
            [100.0, 100.0, 0.9],
            [100.0, 100.0, 0.9],
            [100.0 + dx, 300.0, 0.9],
            [100.0 + dx, 300.0, 0.9],
        );
        let result = SpineClassifier::new(20.0).classify(&kps);
        assert_eq!(result.status, PostureStatus::Correct);
    }

    #[test]
    fn any_sentinel_landmark_yields_unknown() {
        for missing in [LEFT_SHOULDER, RIGHT_SHOULDER, LEFT_HIP, RIGHT_HIP] {
            let mut kps = torso(
                [120.0, 100.0, 0.9],
                [80.0, 100.0, 0.9],
                [120.0, 300.0, 0.9],
                [80.0, 300.0, 0.9],
            );
            kps[missing] = Keypoint::new(-1.0, 0.0, 0.0);

            let result = SpineClassifier::default().classify(&kps);
            assert_eq!(result, Classification::unknown());
        }
    }

    #[test]
    fn truncated_keypoint_set_yields_unknown() {
        let kps = vec![Keypoint::new(100.0, 100.0, 0.9); 3];
        let result = SpineClassifier::default().classify(&kps);
        assert_eq!(result, Classification::unknown());
    }

    #[test]
    fn empty_keypoint_set_yields_unknown() {
        let result = SpineClassifier::default().classify(&[]);
        assert_eq!(result, Classification::unknown());
    }

    #[test]
    fn non_finite_coordinates_yield_unknown() {
        let kps = torso(
            [f64::NAN, 100.0, 0.9],
            [80.0, 100.0, 0.9],
            [120.0, 300.0, 0.9],
            [80.0, 300.0, 0.9],
        );
        let result = SpineClassifier::default().classify(&kps);
        assert_eq!(result, Classification::unknown());
    }
}
