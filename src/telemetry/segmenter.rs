use log::{debug, warn};

use super::{LAP_SENTINEL, Packet, Session};

/// Below this mean wheel speed (m/s) the car is considered parked or in a menu.
pub const MIN_OBSERVED_SPEED: f32 = 2.0;

/// What the segmenter did with a packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Packet discarded without touching the session
    Ignored,
    /// Invalid packet on the session's own track, buffer cleared
    Reset { discarded: usize },
    /// First accepted sample of the session
    Started,
    /// Sample appended to the current lap
    Appended,
    /// Sample appended and the lap counter moved forward
    LapAdvanced { lap_number: u8 },
    /// Lap counter jumped, old buffer dropped and a new session begun with this sample
    Restarted { lap_number: u8 },
    /// Valid sample from a different track, recording must end
    TrackChanged { from: String, to: String },
}

/// Decides, sample by sample, whether the stream belongs to the current
/// session, restarts it, or ends it.
#[derive(Clone, Debug)]
pub struct LapSegmenter {
    min_observed_speed: f32,
    lap_sentinel: u8,
}

impl Default for LapSegmenter {
    fn default() -> Self {
        Self {
            min_observed_speed: MIN_OBSERVED_SPEED,
            lap_sentinel: LAP_SENTINEL,
        }
    }
}

impl LapSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self, packet: &Packet) -> bool {
        packet.lap_number != self.lap_sentinel
            && packet.observed_speed() >= self.min_observed_speed
    }

    pub fn apply(&self, session: &mut Session, packet: Packet) -> Transition {
        if !self.is_valid(&packet) {
            return self.apply_invalid(session, &packet);
        }

        let Some(session_track) = session.track_id.as_deref() else {
            debug!("Session started on track {}", packet.track_id);
            session.track_id = Some(packet.track_id.clone());
            session.adopt_model(&packet.model);
            session.last_lap_number = packet.lap_number;
            session.buffer.push(packet.into_sample());
            return Transition::Started;
        };

        if session_track != packet.track_id {
            return Transition::TrackChanged {
                from: session_track.to_string(),
                to: packet.track_id,
            };
        }

        let lap_number = packet.lap_number;
        if lap_number == session.last_lap_number {
            session.adopt_model(&packet.model);
            session.buffer.push(packet.into_sample());
            Transition::Appended
        } else if session.last_lap_number == 0
            || session.last_lap_number.checked_add(1) == Some(lap_number)
        {
            session.last_lap_number = lap_number;
            session.adopt_model(&packet.model);
            session.buffer.push(packet.into_sample());
            Transition::LapAdvanced { lap_number }
        } else {
            warn!(
                "Lap jumped from {} to {}, discarding {} samples",
                session.last_lap_number,
                lap_number,
                session.buffer.len()
            );
            session.buffer.clear();
            session.track_id = Some(packet.track_id.clone());
            session.model = None;
            session.adopt_model(&packet.model);
            session.last_lap_number = lap_number;
            session.buffer.push(packet.into_sample());
            Transition::Restarted { lap_number }
        }
    }

    fn apply_invalid(&self, session: &mut Session, packet: &Packet) -> Transition {
        match session.track_id.as_deref() {
            Some(track) if track == packet.track_id => {
                let discarded = session.buffer.len();
                if discarded > 0 {
                    debug!("Invalid sample on {track}, resetting {discarded} samples");
                }
                session.reset();
                Transition::Reset { discarded }
            }
            _ => Transition::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn valid(track: &str, lap_number: u8) -> Packet {
        Packet {
            wheel_speed_front: 30.0,
            wheel_speed_rear: 30.0,
            lap_number,
            track_id: track.to_string(),
            model: "mx5".to_string(),
            speed: 30.0,
            ..Default::default()
        }
    }

    fn laps(session: &Session) -> Vec<u8> {
        session.buffer.iter().map(|s| s.lap_number).collect()
    }

    #[test]
    fn test_first_valid_sample_starts_session() {
        let segmenter = LapSegmenter::new();
        let mut session = Session::new();

        assert_eq!(
            segmenter.apply(&mut session, valid("T", 1)),
            Transition::Started
        );
        assert_eq!(session.track_id.as_deref(), Some("T"));
        assert_eq!(session.model.as_deref(), Some("mx5"));
        assert_eq!(session.last_lap_number, 1);
        assert_eq!(session.buffer.len(), 1);
    }

    #[test]
    fn test_invalid_sample_before_start_is_ignored() {
        let segmenter = LapSegmenter::new();
        let mut session = Session::new();

        let parked = Packet {
            wheel_speed_front: 0.5,
            wheel_speed_rear: 1.0,
            ..valid("T", 1)
        };
        assert_eq!(segmenter.apply(&mut session, parked), Transition::Ignored);
        assert_eq!(session, Session::new());
    }

    #[test]
    fn test_invalid_sample_on_same_track_resets() {
        let segmenter = LapSegmenter::new();
        let mut session = Session::new();
        for _ in 0..5 {
            segmenter.apply(&mut session, valid("T", 1));
        }
        assert_eq!(session.buffer.len(), 5);

        let in_pits = Packet {
            lap_number: LAP_SENTINEL,
            wheel_speed_front: 0.0,
            wheel_speed_rear: 0.0,
            speed: 0.0,
            ..valid("T", 1)
        };
        assert_eq!(
            segmenter.apply(&mut session, in_pits),
            Transition::Reset { discarded: 5 }
        );
        assert!(session.buffer.is_empty());
        assert_eq!(session.last_lap_number, 0);
        assert_eq!(session.model, None);
        assert_eq!(session.track_id.as_deref(), Some("T"));
    }

    #[test]
    fn test_invalid_sample_from_other_track_is_ignored() {
        let segmenter = LapSegmenter::new();
        let mut session = Session::new();
        segmenter.apply(&mut session, valid("T", 1));

        let noise = Packet {
            lap_number: LAP_SENTINEL,
            ..valid("U", 1)
        };
        assert_eq!(segmenter.apply(&mut session, noise), Transition::Ignored);
        assert_eq!(session.buffer.len(), 1);
    }

    #[test]
    fn test_lap_jump_restarts_with_triggering_sample() {
        let segmenter = LapSegmenter::new();
        let mut session = Session::new();

        segmenter.apply(&mut session, valid("T", 1));
        segmenter.apply(&mut session, valid("T", 2));
        let transition = segmenter.apply(&mut session, valid("T", 5));

        assert_eq!(transition, Transition::Restarted { lap_number: 5 });
        assert_eq!(laps(&session), vec![5]);
        assert_eq!(session.last_lap_number, 5);
        assert_eq!(session.track_id.as_deref(), Some("T"));
    }

    #[test]
    fn test_lap_after_reset_is_accepted() {
        let segmenter = LapSegmenter::new();
        let mut session = Session::new();
        segmenter.apply(&mut session, valid("T", 3));
        segmenter.apply(
            &mut session,
            Packet {
                lap_number: LAP_SENTINEL,
                ..valid("T", 3)
            },
        );

        assert_eq!(
            segmenter.apply(&mut session, valid("T", 7)),
            Transition::LapAdvanced { lap_number: 7 }
        );
        assert_eq!(laps(&session), vec![7]);
    }

    #[test]
    fn test_track_change_does_not_append() {
        let segmenter = LapSegmenter::new();
        let mut session = Session::new();
        segmenter.apply(&mut session, valid("T", 1));

        assert_eq!(
            segmenter.apply(&mut session, valid("U", 1)),
            Transition::TrackChanged {
                from: "T".to_string(),
                to: "U".to_string()
            }
        );
        assert_eq!(session.buffer.len(), 1);
        assert_eq!(session.track_id.as_deref(), Some("T"));
    }

    #[test]
    fn test_model_is_kept_until_reset() {
        let segmenter = LapSegmenter::new();
        let mut session = Session::new();
        segmenter.apply(&mut session, valid("T", 1));
        segmenter.apply(
            &mut session,
            Packet {
                model: "gt86".to_string(),
                ..valid("T", 2)
            },
        );
        assert_eq!(session.model.as_deref(), Some("mx5"));

        segmenter.apply(
            &mut session,
            Packet {
                lap_number: LAP_SENTINEL,
                ..valid("T", 2)
            },
        );
        segmenter.apply(
            &mut session,
            Packet {
                model: "gt86".to_string(),
                ..valid("T", 2)
            },
        );
        assert_eq!(session.model.as_deref(), Some("gt86"));
    }

    proptest! {
        #[test]
        fn prop_consecutive_laps_are_all_kept(
            start in 1u8..50,
            per_lap in proptest::collection::vec(1usize..6, 1..20),
        ) {
            let segmenter = LapSegmenter::new();
            let mut session = Session::new();
            let mut expected = 0;
            for (offset, count) in per_lap.iter().enumerate() {
                let lap = start + offset as u8;
                for _ in 0..*count {
                    let transition = segmenter.apply(&mut session, valid("T", lap));
                    let restarted = matches!(transition, Transition::Restarted { .. });
                    prop_assert!(!restarted);
                    expected += 1;
                }
            }
            prop_assert_eq!(session.buffer.len(), expected);
            prop_assert!(session.buffer.iter().all(|s| s.track_id == "T"));
        }
    }
}
