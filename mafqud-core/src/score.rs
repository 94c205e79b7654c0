use crate::config::{MatchSettings, MissingFacePolicy};
use crate::report::{Gender, Location, Report};

/// Weighted share of each metadata factor in the 0-100 metadata score
const GENDER_WEIGHT: f64 = 0.40;
const AGE_WEIGHT: f64 = 0.35;
const LOCATION_WEIGHT: f64 = 0.25;

/// Weights used when a face score is available for the pair
const METADATA_WEIGHT_WITH_FACE: f64 = 0.4;
const FACE_WEIGHT: f64 = 0.6;

/// Sub-score for a factor where either side is unknown
const UNKNOWN_SUB_SCORE: u8 = 50;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Per-factor breakdown of a metadata comparison, kept for explain output
#[derive(Debug, Clone, Copy)]
pub struct MetadataBreakdown {
    pub gender: u8,
    pub age: u8,
    pub location: u8,
    pub total: u8,
}

/// Compute the 0-100 metadata similarity score between two reports.
/// Pure and symmetric in its arguments.
pub fn metadata_score(a: &Report, b: &Report) -> u8 {
    metadata_breakdown(a, b).total
}

pub fn metadata_breakdown(a: &Report, b: &Report) -> MetadataBreakdown {
    let gender = gender_score(a.gender, b.gender);
    let age = age_score(a.age, b.age);
    let location = location_score(a.location, b.location);

    let total = gender as f64 * GENDER_WEIGHT
        + age as f64 * AGE_WEIGHT
        + location as f64 * LOCATION_WEIGHT;

    MetadataBreakdown {
        gender,
        age,
        location,
        total: clamp_score(total),
    }
}

fn gender_score(a: Gender, b: Gender) -> u8 {
    if a == Gender::Unknown || b == Gender::Unknown {
        return UNKNOWN_SUB_SCORE;
    }
    if a == b {
        100
    } else {
        0
    }
}

fn age_score(a: Option<u8>, b: Option<u8>) -> u8 {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return UNKNOWN_SUB_SCORE,
    };

    match a.abs_diff(b) {
        0 => 100,
        1..=2 => 90,
        3..=5 => 70,
        6..=10 => 40,
        _ => 10,
    }
}

fn location_score(a: Option<Location>, b: Option<Location>) -> u8 {
    // Either location absent is treated as "unknown", consistent with the
    // gender and age factors, so the weighted sum stays well-defined.
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return UNKNOWN_SUB_SCORE,
    };

    let km = haversine_km(a, b);
    if km <= 0.5 {
        100
    } else if km <= 1.0 {
        90
    } else if km <= 2.0 {
        70
    } else if km <= 5.0 {
        50
    } else if km <= 10.0 {
        30
    } else {
        10
    }
}

/// Great-circle distance between two points in kilometers
pub fn haversine_km(a: Location, b: Location) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Combine the metadata score with an optional face score into the total
/// 0-100 score for a candidate pair.
///
/// With face recognition disabled system-wide the metadata score stands
/// alone; the missing-face policy only governs a pair whose face score
/// could not be determined while face recognition is enabled.
pub fn total_score(metadata: u8, face: Option<u8>, settings: &MatchSettings) -> u8 {
    if !settings.use_face_recognition {
        return metadata;
    }

    match (face, settings.missing_face_policy) {
        (Some(face), _) => clamp_score(
            metadata as f64 * METADATA_WEIGHT_WITH_FACE + face as f64 * FACE_WEIGHT,
        ),
        // No biometric evidence for this pair: either reweight to
        // metadata-only or blend a zero face score, per settings.
        (None, MissingFacePolicy::MetadataOnly) => metadata,
        (None, MissingFacePolicy::ZeroFace) => {
            clamp_score(metadata as f64 * METADATA_WEIGHT_WITH_FACE)
        }
    }
}

fn clamp_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportKind, ReportStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn report(
        gender: Gender,
        age: Option<u8>,
        location: Option<(f64, f64)>,
    ) -> Report {
        Report {
            id: Uuid::new_v4(),
            kind: ReportKind::Lost,
            status: ReportStatus::Active,
            name: "test".to_string(),
            age,
            gender,
            location: location.map(|(latitude, longitude)| Location {
                latitude,
                longitude,
            }),
            images: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_gender_score_bands() {
        assert_eq!(gender_score(Gender::Male, Gender::Male), 100);
        assert_eq!(gender_score(Gender::Male, Gender::Female), 0);
        assert_eq!(gender_score(Gender::Unknown, Gender::Female), 50);
        assert_eq!(gender_score(Gender::Male, Gender::Unknown), 50);
    }

    #[test]
    fn test_age_score_bands() {
        assert_eq!(age_score(Some(30), Some(30)), 100);
        assert_eq!(age_score(Some(30), Some(32)), 90);
        assert_eq!(age_score(Some(30), Some(35)), 70);
        assert_eq!(age_score(Some(30), Some(40)), 40);
        assert_eq!(age_score(Some(30), Some(50)), 10);
        assert_eq!(age_score(None, Some(30)), 50);
        assert_eq!(age_score(Some(30), None), 50);
    }

    #[test]
    fn test_location_score_bands() {
        let base = Location {
            latitude: 32.0,
            longitude: 44.0,
        };
        // ~1 degree latitude is ~111 km; offsets chosen per band
        let at_km = |km: f64| Location {
            latitude: 32.0 + km / 111.0,
            longitude: 44.0,
        };
        assert_eq!(location_score(Some(base), Some(at_km(0.3))), 100);
        assert_eq!(location_score(Some(base), Some(at_km(0.8))), 90);
        assert_eq!(location_score(Some(base), Some(at_km(1.5))), 70);
        assert_eq!(location_score(Some(base), Some(at_km(4.0))), 50);
        assert_eq!(location_score(Some(base), Some(at_km(8.0))), 30);
        assert_eq!(location_score(Some(base), Some(at_km(15.0))), 10);
        assert_eq!(location_score(None, Some(base)), 50);
        assert_eq!(location_score(Some(base), None), 50);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Najaf to Karbala is roughly 60 km
        let najaf = Location {
            latitude: 32.0259,
            longitude: 44.3466,
        };
        let karbala = Location {
            latitude: 32.6160,
            longitude: 44.0249,
        };
        let km = haversine_km(najaf, karbala);
        assert!((55.0..75.0).contains(&km), "got {} km", km);
    }

    #[test]
    fn test_metadata_score_symmetry() {
        let a = report(Gender::Male, Some(30), Some((32.0, 44.0)));
        let b = report(Gender::Unknown, Some(34), Some((32.05, 44.01)));
        assert_eq!(metadata_score(&a, &b), metadata_score(&b, &a));
    }

    #[test]
    fn test_perfect_metadata_match() {
        // Same gender, age diff 0, distance ~0.3 km
        let a = report(Gender::Female, Some(8), Some((32.0, 44.0)));
        let b = report(Gender::Female, Some(8), Some((32.0027, 44.0)));
        assert_eq!(metadata_score(&a, &b), 100);
    }

    #[test]
    fn test_poor_metadata_match() {
        // Gender differs, age diff 12, distance ~15 km:
        // 0*0.4 + 10*0.35 + 10*0.25 = 6
        let a = report(Gender::Male, Some(20), Some((32.0, 44.0)));
        let b = report(Gender::Female, Some(32), Some((32.135, 44.0)));
        assert_eq!(metadata_score(&a, &b), 6);
    }

    #[test]
    fn test_unknown_gender_blend() {
        // Unknown gender, age diff 3, distance ~1 km:
        // 50*0.4 + 70*0.35 + 90*0.25 = 67 ... age diff 3 is band 70
        let a = report(Gender::Unknown, Some(10), Some((32.0, 44.0)));
        let b = report(Gender::Female, Some(13), Some((32.008, 44.0)));
        let breakdown = metadata_breakdown(&a, &b);
        assert_eq!(breakdown.gender, 50);
        assert_eq!(breakdown.age, 70);
        assert_eq!(breakdown.location, 90);
        assert_eq!(breakdown.total, 67);
    }

    #[test]
    fn test_total_score_with_face() {
        let mut settings = MatchSettings::default();
        settings.use_face_recognition = true;
        // 74*0.4 + 90*0.6 = 83.6 -> 84
        assert_eq!(total_score(74, Some(90), &settings), 84);
    }

    #[test]
    fn test_total_score_face_absent_falls_back_to_metadata() {
        let mut settings = MatchSettings::default();
        settings.use_face_recognition = true;
        assert_eq!(total_score(73, None, &settings), 73);
    }

    #[test]
    fn test_total_score_face_disabled_ignores_face() {
        let settings = MatchSettings::default();
        assert_eq!(total_score(73, Some(100), &settings), 73);
    }

    #[test]
    fn test_total_score_face_disabled_ignores_zero_face_policy() {
        // The zero-face blend only applies while face recognition is
        // enabled; disabled means metadata stands alone at full weight
        let mut settings = MatchSettings::default();
        settings.use_face_recognition = false;
        settings.missing_face_policy = MissingFacePolicy::ZeroFace;
        assert_eq!(total_score(80, None, &settings), 80);
        assert_eq!(total_score(100, Some(100), &settings), 100);
    }

    #[test]
    fn test_total_score_zero_face_policy() {
        let mut settings = MatchSettings::default();
        settings.use_face_recognition = true;
        settings.missing_face_policy = MissingFacePolicy::ZeroFace;
        // 80*0.4 + 0*0.6 = 32
        assert_eq!(total_score(80, None, &settings), 32);
    }

    #[test]
    fn test_scores_bounded() {
        let a = report(Gender::Male, Some(0), Some((32.0, 44.0)));
        let b = report(Gender::Male, Some(0), Some((32.0, 44.0)));
        let score = metadata_score(&a, &b);
        assert!(score <= 100);
        let mut settings = MatchSettings::default();
        settings.use_face_recognition = true;
        assert!(total_score(score, Some(100), &settings) <= 100);
    }

    #[test]
    fn test_age_monotonicity() {
        let mut last = 100;
        for diff in 0..=15u8 {
            let score = age_score(Some(30), Some(30 + diff));
            assert!(score <= last, "age score increased at diff {}", diff);
            last = score;
        }
    }
}
