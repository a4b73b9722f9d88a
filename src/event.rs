use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    ShotOnGoal,
    Goal,
    Takeaway,
    Other,
}

impl EventType {
    fn from_desc_key(key: &str) -> Self {
        match key {
            "shot-on-goal" => EventType::ShotOnGoal,
            "goal" => EventType::Goal,
            "takeaway" => EventType::Takeaway,
            _ => EventType::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EventType::ShotOnGoal => "shot",
            EventType::Goal => "goal",
            EventType::Takeaway => "takeaway",
            EventType::Other => "other",
        }
    }

    pub fn is_shot_or_goal(self) -> bool {
        matches!(self, EventType::ShotOnGoal | EventType::Goal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub game_id: i64,
    pub period: i32,
    pub time_in_period: i32,
    pub event_type: EventType,
    pub team_id: Option<i64>,
    pub x_coord: Option<f64>,
    pub y_coord: Option<f64>,
    pub shot_type: Option<String>,
    pub shooting_or_scoring_player_id: Option<i64>,
    pub goalie_player_id: Option<i64>,
    pub empty_net: bool,
}

pub fn parse_clock(raw: &str) -> Option<i32> {
    let (minutes, seconds) = raw.split_once(':')?;
    let minutes: i32 = minutes.parse().ok()?;
    let seconds: i32 = seconds.parse().ok()?;
    if minutes < 0 || !(0..60).contains(&seconds) {
        return None;
    }
    Some(minutes * 60 + seconds)
}

pub fn normalize_events<'a>(
    game_id: i64,
    plays: &'a [Value],
) -> impl Iterator<Item = EventRecord> + 'a {
    plays
        .iter()
        .filter_map(move |play| normalize_play(game_id, play))
}

fn normalize_play(game_id: i64, play: &Value) -> Option<EventRecord> {
    let event_type = play
        .get("typeDescKey")
        .and_then(|value| value.as_str())
        .map(EventType::from_desc_key)
        .unwrap_or(EventType::Other);

    let Some(period) = play
        .get("periodDescriptor")
        .and_then(|descriptor| descriptor.get("number"))
        .and_then(|value| value.as_i64())
        .filter(|number| *number >= 1)
    else {
        eprintln!("Skipping play without a period number in game {}", game_id);
        return None;
    };

    let raw_clock = play
        .get("timeInPeriod")
        .and_then(|value| value.as_str())
        .unwrap_or("");
    let Some(time_in_period) = parse_clock(raw_clock) else {
        eprintln!(
            "Skipping play with malformed timeInPeriod {:?} in game {}",
            raw_clock, game_id
        );
        return None;
    };

    let details = play.get("details");

    // Goals carry the scorer, shots the shooter; one field holds whichever applies.
    let player_key = match event_type {
        EventType::Goal => Some("scoringPlayerId"),
        EventType::ShotOnGoal => Some("shootingPlayerId"),
        _ => None,
    };

    Some(EventRecord {
        game_id,
        period: period as i32,
        time_in_period,
        event_type,
        team_id: detail_i64(details, "eventOwnerTeamId"),
        x_coord: detail_f64(details, "xCoord"),
        y_coord: detail_f64(details, "yCoord"),
        shot_type: details
            .and_then(|d| d.get("shotType"))
            .and_then(|value| value.as_str())
            .map(|value| value.to_string()),
        shooting_or_scoring_player_id: player_key.and_then(|key| detail_i64(details, key)),
        goalie_player_id: detail_i64(details, "goalieInNetId"),
        empty_net: details
            .and_then(|d| d.get("emptyNet"))
            .and_then(|value| value.as_bool())
            .unwrap_or(false),
    })
}

fn detail_i64(details: Option<&Value>, key: &str) -> Option<i64> {
    details.and_then(|d| d.get(key)).and_then(|v| v.as_i64())
}

fn detail_f64(details: Option<&Value>, key: &str) -> Option<f64> {
    details.and_then(|d| d.get(key)).and_then(|v| v.as_f64())
}
