// Lap statistics over a finished session buffer

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::telemetry::{LAP_SENTINEL, Sample};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LapSummary {
    pub lap_number: u8,
    pub samples: usize,
    /// Shortest positive lap time reported while on this lap
    pub best_lap_time: Option<f32>,
    pub average_speed: f32,
    pub top_speed: f32,
}

/// Lap numbers in the order they were driven, one entry per change of lap.
pub fn lap_boundaries(buffer: &[Sample]) -> Vec<u8> {
    buffer.iter().map(|s| s.lap_number).dedup().collect()
}

/// The lap with the smallest positive reported lap time, if any.
pub fn fastest_lap(buffer: &[Sample]) -> Option<u8> {
    best_lap_times(buffer)
        .into_iter()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(lap_number, _)| lap_number)
}

pub fn average_speed(buffer: &[Sample], lap_number: u8) -> f32 {
    let (sum, count) = buffer
        .iter()
        .filter(|s| s.lap_number == lap_number)
        .fold((0.0f64, 0usize), |(sum, count), s| {
            (sum + f64::from(s.speed), count + 1)
        });
    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

pub fn top_speed(buffer: &[Sample], lap_number: u8) -> f32 {
    buffer
        .iter()
        .filter(|s| s.lap_number == lap_number)
        .map(|s| s.speed)
        .reduce(f32::max)
        .unwrap_or(0.0)
}

/// Per-lap statistics in driving order, skipping samples off a valid lap.
pub fn lap_summaries(buffer: &[Sample]) -> Vec<LapSummary> {
    let best_times = best_lap_times(buffer);
    let counts = buffer.iter().counts_by(|s| s.lap_number);

    lap_boundaries(buffer)
        .into_iter()
        .filter(|lap| *lap != LAP_SENTINEL)
        .unique()
        .map(|lap_number| LapSummary {
            lap_number,
            samples: counts.get(&lap_number).copied().unwrap_or(0),
            best_lap_time: best_times.get(&lap_number).copied(),
            average_speed: average_speed(buffer, lap_number),
            top_speed: top_speed(buffer, lap_number),
        })
        .collect()
}

fn best_lap_times(buffer: &[Sample]) -> BTreeMap<u8, f32> {
    let mut best = BTreeMap::new();
    for sample in buffer
        .iter()
        .filter(|s| s.lap_number != LAP_SENTINEL && s.last_lap_time > 0.0)
    {
        best.entry(sample.lap_number)
            .and_modify(|t: &mut f32| *t = t.min(sample.last_lap_time))
            .or_insert(sample.last_lap_time);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(lap_number: u8, last_lap_time: f32, speed: f32) -> Sample {
        Sample {
            last_lap_time,
            lap_number,
            track_id: "T".to_string(),
            speed,
            ..Default::default()
        }
    }

    #[test]
    fn test_lap_boundaries_collapses_runs() {
        let buffer = vec![
            sample(1, 0.0, 10.0),
            sample(1, 0.0, 10.0),
            sample(2, 0.0, 10.0),
            sample(3, 0.0, 10.0),
            sample(3, 0.0, 10.0),
        ];
        assert_eq!(lap_boundaries(&buffer), vec![1, 2, 3]);
        assert!(lap_boundaries(&[]).is_empty());
    }

    #[test]
    fn test_fastest_lap_uses_minimum_positive_time() {
        let buffer = vec![
            sample(1, 0.0, 10.0),
            sample(2, 95.0, 10.0),
            sample(2, 93.5, 10.0),
            sample(3, 94.0, 10.0),
            sample(LAP_SENTINEL, 50.0, 0.0),
        ];
        assert_eq!(fastest_lap(&buffer), Some(2));
    }

    #[test]
    fn test_fastest_lap_none_without_times() {
        let buffer = vec![sample(1, 0.0, 10.0), sample(LAP_SENTINEL, 80.0, 0.0)];
        assert_eq!(fastest_lap(&buffer), None);
        assert_eq!(fastest_lap(&[]), None);
    }

    #[test]
    fn test_speed_statistics() {
        let buffer = vec![
            sample(1, 0.0, 10.0),
            sample(1, 0.0, 30.0),
            sample(2, 0.0, 50.0),
        ];
        assert_eq!(average_speed(&buffer, 1), 20.0);
        assert_eq!(top_speed(&buffer, 1), 30.0);
        assert_eq!(average_speed(&buffer, 2), 50.0);
        assert_eq!(average_speed(&buffer, 9), 0.0);
        assert_eq!(top_speed(&buffer, 9), 0.0);
    }

    #[test]
    fn test_lap_summaries() {
        let buffer = vec![
            sample(LAP_SENTINEL, 0.0, 0.0),
            sample(1, 0.0, 20.0),
            sample(1, 0.0, 40.0),
            sample(2, 91.0, 60.0),
        ];
        let summaries = lap_summaries(&buffer);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].lap_number, 1);
        assert_eq!(summaries[0].samples, 2);
        assert_eq!(summaries[0].best_lap_time, None);
        assert_eq!(summaries[0].average_speed, 30.0);
        assert_eq!(summaries[1].best_lap_time, Some(91.0));
        assert_eq!(summaries[1].top_speed, 60.0);
    }

    proptest! {
        #[test]
        fn prop_boundaries_of_increasing_laps(
            per_lap in proptest::collection::vec(1usize..8, 1..40),
        ) {
            let mut buffer = Vec::new();
            let mut expected = Vec::new();
            for (lap, count) in per_lap.iter().enumerate() {
                let lap = lap as u8 + 1;
                expected.push(lap);
                for _ in 0..*count {
                    buffer.push(sample(lap, 0.0, 25.0));
                }
            }
            prop_assert_eq!(lap_boundaries(&buffer), expected);
        }
    }
}
