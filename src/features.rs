use crate::event::{EventRecord, EventType};
use std::collections::HashMap;

const SEQUENCE_WINDOW_SECS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DangerZone {
    High,
    Medium,
    Low,
}

impl DangerZone {
    pub fn label(self) -> &'static str {
        match self {
            DangerZone::High => "High",
            DangerZone::Medium => "Medium",
            DangerZone::Low => "Low",
        }
    }
}

// Distance stays null without coordinates; the zone is always assigned and
// falls back to Low. Bands are inclusive and checked innermost-first.
pub fn classify(x: Option<f64>, y: Option<f64>) -> (Option<f64>, DangerZone) {
    let (Some(x), Some(y)) = (x, y) else {
        return (None, DangerZone::Low);
    };

    let distance = (x * x + y * y).sqrt();
    let zone = if (-20.0..=20.0).contains(&x) && (-10.0..=10.0).contains(&y) {
        DangerZone::High
    } else if (-30.0..=30.0).contains(&x) && (-20.0..=20.0).contains(&y) {
        DangerZone::Medium
    } else {
        DangerZone::Low
    };

    (Some(distance), zone)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceFeatures {
    pub rebound: bool,
    pub shot_off_rush: bool,
    pub time_between_shots: i32,
}

#[derive(Debug, Clone, Copy)]
struct PreviousEvent {
    event_type: EventType,
    team_id: Option<i64>,
    time_in_period: i32,
}

// Rolling state for one (game, period) partition. Events must be pushed in
// non-decreasing time order; the caller sorts and resets at period
// boundaries.
#[derive(Debug, Default)]
pub struct SequenceScan {
    team_scoped_shot_gap: bool,
    previous: Option<PreviousEvent>,
    last_shot_time: Option<i32>,
    last_shot_time_by_team: HashMap<i64, i32>,
}

impl SequenceScan {
    pub fn new(team_scoped_shot_gap: bool) -> Self {
        Self {
            team_scoped_shot_gap,
            ..Self::default()
        }
    }

    pub fn push(&mut self, event: &EventRecord) -> SequenceFeatures {
        let mut features = SequenceFeatures::default();

        if event.event_type.is_shot_or_goal() {
            features.time_between_shots = self.shot_gap(event);
        }

        if event.event_type == EventType::ShotOnGoal {
            if let Some(previous) = self.previous {
                let same_team = matches!(
                    (previous.team_id, event.team_id),
                    (Some(a), Some(b)) if a == b
                );
                let delta = event.time_in_period - previous.time_in_period;
                let in_window = delta > 0 && delta <= SEQUENCE_WINDOW_SECS;

                features.rebound =
                    same_team && in_window && previous.event_type.is_shot_or_goal();
                features.shot_off_rush =
                    same_team && in_window && previous.event_type == EventType::Takeaway;
            }
        }

        self.previous = Some(PreviousEvent {
            event_type: event.event_type,
            team_id: event.team_id,
            time_in_period: event.time_in_period,
        });

        if event.event_type == EventType::ShotOnGoal {
            self.last_shot_time = Some(event.time_in_period);
            if let Some(team) = event.team_id {
                self.last_shot_time_by_team
                    .insert(team, event.time_in_period);
            }
        }

        features
    }

    fn shot_gap(&self, event: &EventRecord) -> i32 {
        let last = if self.team_scoped_shot_gap {
            event
                .team_id
                .and_then(|team| self.last_shot_time_by_team.get(&team).copied())
        } else {
            self.last_shot_time
        };

        last.map(|time| event.time_in_period - time).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: EventType, team_id: Option<i64>, time_in_period: i32) -> EventRecord {
        EventRecord {
            game_id: 2016020001,
            period: 1,
            time_in_period,
            event_type,
            team_id,
            x_coord: None,
            y_coord: None,
            shot_type: None,
            shooting_or_scoring_player_id: None,
            goalie_player_id: None,
            empty_net: false,
        }
    }

    #[test]
    fn distance_is_exact_euclidean() {
        let (distance, _) = classify(Some(3.0), Some(4.0));
        assert_eq!(distance, Some(5.0));

        let (distance, zone) = classify(Some(0.0), Some(0.0));
        assert_eq!(distance, Some(0.0));
        assert_eq!(zone, DangerZone::High);
    }

    #[test]
    fn zone_bands_are_inclusive() {
        assert_eq!(classify(Some(25.0), Some(0.0)).1, DangerZone::Medium);
        assert_eq!(classify(Some(35.0), Some(25.0)).1, DangerZone::Low);
        assert_eq!(classify(Some(20.0), Some(10.0)).1, DangerZone::High);
        assert_eq!(classify(Some(-20.0), Some(-10.0)).1, DangerZone::High);
        assert_eq!(classify(Some(30.0), Some(20.0)).1, DangerZone::Medium);
        assert_eq!(classify(Some(0.0), Some(11.0)).1, DangerZone::Medium);
    }

    #[test]
    fn missing_coordinates_keep_distance_null_and_zone_low() {
        assert_eq!(classify(None, Some(5.0)), (None, DangerZone::Low));
        assert_eq!(classify(Some(5.0), None), (None, DangerZone::Low));
        assert_eq!(classify(None, None), (None, DangerZone::Low));
    }

    #[test]
    fn consecutive_same_team_shots_are_rebounds() {
        let mut scan = SequenceScan::new(false);
        let first = scan.push(&event(EventType::ShotOnGoal, Some(2), 100));
        let second = scan.push(&event(EventType::ShotOnGoal, Some(2), 105));

        assert!(!first.rebound);
        assert_eq!(first.time_between_shots, 0);
        assert!(second.rebound);
        assert!(!second.shot_off_rush);
        assert_eq!(second.time_between_shots, 5);
    }

    #[test]
    fn rebound_window_is_exclusive_zero_inclusive_ten() {
        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::ShotOnGoal, Some(2), 100));
        let same_instant = scan.push(&event(EventType::ShotOnGoal, Some(2), 100));
        assert!(!same_instant.rebound);

        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::ShotOnGoal, Some(2), 100));
        let at_window_edge = scan.push(&event(EventType::ShotOnGoal, Some(2), 110));
        assert!(at_window_edge.rebound);

        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::ShotOnGoal, Some(2), 100));
        let past_window = scan.push(&event(EventType::ShotOnGoal, Some(2), 111));
        assert!(!past_window.rebound);
        assert_eq!(past_window.time_between_shots, 11);
    }

    #[test]
    fn differing_or_missing_teams_never_rebound() {
        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::ShotOnGoal, Some(2), 100));
        assert!(!scan.push(&event(EventType::ShotOnGoal, Some(3), 105)).rebound);

        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::ShotOnGoal, None, 100));
        assert!(!scan.push(&event(EventType::ShotOnGoal, None, 105)).rebound);
    }

    #[test]
    fn goal_can_precede_a_rebound_but_never_is_one() {
        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::Goal, Some(4), 50));
        let shot = scan.push(&event(EventType::ShotOnGoal, Some(4), 55));
        assert!(shot.rebound);

        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::ShotOnGoal, Some(4), 50));
        let goal = scan.push(&event(EventType::Goal, Some(4), 55));
        assert!(!goal.rebound);
        assert_eq!(goal.time_between_shots, 5);
    }

    #[test]
    fn intervening_event_breaks_the_rebound_chain() {
        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::ShotOnGoal, Some(2), 100));
        scan.push(&event(EventType::Other, Some(3), 102));
        let shot = scan.push(&event(EventType::ShotOnGoal, Some(2), 104));

        assert!(!shot.rebound);
        assert_eq!(shot.time_between_shots, 4);
    }

    #[test]
    fn takeaway_then_quick_shot_is_a_rush() {
        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::Takeaway, Some(1), 5));
        let shot = scan.push(&event(EventType::ShotOnGoal, Some(1), 12));

        assert!(shot.shot_off_rush);
        assert!(!shot.rebound);
        assert_eq!(shot.time_between_shots, 0);
    }

    #[test]
    fn takeaway_then_goal_is_not_a_rush() {
        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::Takeaway, Some(1), 5));
        let goal = scan.push(&event(EventType::Goal, Some(1), 12));
        assert!(!goal.shot_off_rush);
    }

    #[test]
    fn shot_gap_ignores_team_by_default() {
        let mut scan = SequenceScan::new(false);
        scan.push(&event(EventType::ShotOnGoal, Some(1), 10));
        let other_team = scan.push(&event(EventType::ShotOnGoal, Some(2), 25));
        assert_eq!(other_team.time_between_shots, 15);
    }

    #[test]
    fn shot_gap_can_be_scoped_per_team() {
        let mut scan = SequenceScan::new(true);
        scan.push(&event(EventType::ShotOnGoal, Some(1), 10));
        let other_team = scan.push(&event(EventType::ShotOnGoal, Some(2), 25));
        assert_eq!(other_team.time_between_shots, 0);

        let same_team = scan.push(&event(EventType::ShotOnGoal, Some(1), 40));
        assert_eq!(same_team.time_between_shots, 30);
    }
}
