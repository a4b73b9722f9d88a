use polars::prelude::ParquetWriter;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::event::{self, EventRecord};
use crate::features::{self, SequenceScan};

#[derive(Debug, Clone, Copy, Default)]
pub struct TidyOptions {
    pub team_scoped_shot_gap: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TidyRow {
    pub game_id: i64,
    pub period: i32,
    pub time_in_period: i32,
    pub event_type: &'static str,
    pub team_id: Option<i64>,
    pub x_coord: Option<f64>,
    pub y_coord: Option<f64>,
    pub shot_type: Option<String>,
    pub shooting_or_scoring_player_id: Option<i64>,
    pub goalie_player_id: Option<i64>,
    pub empty_net: bool,
    pub shot_distance: Option<f64>,
    pub danger_zone: &'static str,
    pub rebound: bool,
    pub shot_off_rush: bool,
    pub time_between_shots: i32,
}

pub fn extract_tidy(
    raw_dir: &Path,
    out_path: &Path,
    format: &str,
    options: &TidyOptions,
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut files = collect_json_files(raw_dir);
    files.sort();

    // Games share no state, so they fan out across threads; row order is the
    // sorted file order followed by each game's chronological order.
    let per_game: Vec<Vec<TidyRow>> = files
        .par_iter()
        .filter_map(|path| process_file(path, options))
        .collect();

    let games = per_game.len();
    let rows: Vec<TidyRow> = per_game.into_iter().flatten().collect();

    eprintln!(
        "Processed {} of {} game files into {} shot/goal rows",
        games,
        files.len(),
        rows.len()
    );

    match format {
        "parquet" => write_parquet(rows, out_path),
        "csv" => write_csv(rows, out_path),
        other => Err(format!(
            "Unsupported format '{}'. Supported formats: parquet, csv.",
            other
        )
        .into()),
    }
}

fn process_file(path: &Path, options: &TidyOptions) -> Option<Vec<TidyRow>> {
    let contents = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Skipping unreadable file {}: {}", path.display(), err);
            return None;
        }
    };

    let parsed: Value = match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Skipping invalid JSON {}: {}", path.display(), err);
            return None;
        }
    };

    let Some(game_id) = parsed.get("id").and_then(|v| v.as_i64()) else {
        eprintln!("Missing game id in {}", path.display());
        return None;
    };

    let Some(plays) = parsed.get("plays").and_then(|p| p.as_array()) else {
        eprintln!("Missing plays array in {}", path.display());
        return None;
    };

    Some(process_game(game_id, plays, options))
}

pub fn process_game(game_id: i64, plays: &[Value], options: &TidyOptions) -> Vec<TidyRow> {
    let mut events: Vec<EventRecord> = event::normalize_events(game_id, plays).collect();

    // Time order within a partition is a precondition of the scan, not an
    // assumption about the source; the stable sort keeps source order for
    // equal timestamps.
    events.sort_by_key(|e| (e.period, e.time_in_period));

    let mut rows = Vec::new();
    let mut scan = SequenceScan::new(options.team_scoped_shot_gap);
    let mut current_period = None;

    for event in &events {
        if current_period != Some(event.period) {
            scan = SequenceScan::new(options.team_scoped_shot_gap);
            current_period = Some(event.period);
        }

        let sequence = scan.push(event);

        if !event.event_type.is_shot_or_goal() {
            continue;
        }

        let (shot_distance, danger_zone) = features::classify(event.x_coord, event.y_coord);

        rows.push(TidyRow {
            game_id: event.game_id,
            period: event.period,
            time_in_period: event.time_in_period,
            event_type: event.event_type.label(),
            team_id: event.team_id,
            x_coord: event.x_coord,
            y_coord: event.y_coord,
            shot_type: event.shot_type.clone(),
            shooting_or_scoring_player_id: event.shooting_or_scoring_player_id,
            goalie_player_id: event.goalie_player_id,
            empty_net: event.empty_net,
            shot_distance,
            danger_zone: danger_zone.label(),
            rebound: sequence.rebound,
            shot_off_rush: sequence.shot_off_rush,
            time_between_shots: sequence.time_between_shots,
        });
    }

    rows
}

fn collect_json_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(path) = stack.pop() {
        let Ok(entries) = fs::read_dir(&path) else {
            continue;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                files.push(path);
            }
        }
    }

    files
}

fn write_parquet(rows: Vec<TidyRow>, out_path: &Path) -> Result<(), Box<dyn Error>> {
    let mut df = build_dataframe(rows)?;
    let mut file = File::create(out_path)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}

fn write_csv(rows: Vec<TidyRow>, out_path: &Path) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(out_path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn build_dataframe(rows: Vec<TidyRow>) -> Result<DataFrame, PolarsError> {
    let mut game_id: Vec<i64> = Vec::new();
    let mut period: Vec<i32> = Vec::new();
    let mut time_in_period: Vec<i32> = Vec::new();
    let mut event_type: Vec<&'static str> = Vec::new();
    let mut team_id: Vec<Option<i64>> = Vec::new();
    let mut x_coord: Vec<Option<f64>> = Vec::new();
    let mut y_coord: Vec<Option<f64>> = Vec::new();
    let mut shot_type: Vec<Option<String>> = Vec::new();
    let mut shooting_or_scoring_player_id: Vec<Option<i64>> = Vec::new();
    let mut goalie_player_id: Vec<Option<i64>> = Vec::new();
    let mut empty_net: Vec<bool> = Vec::new();
    let mut shot_distance: Vec<Option<f64>> = Vec::new();
    let mut danger_zone: Vec<&'static str> = Vec::new();
    let mut rebound: Vec<bool> = Vec::new();
    let mut shot_off_rush: Vec<bool> = Vec::new();
    let mut time_between_shots: Vec<i32> = Vec::new();

    for row in rows {
        game_id.push(row.game_id);
        period.push(row.period);
        time_in_period.push(row.time_in_period);
        event_type.push(row.event_type);
        team_id.push(row.team_id);
        x_coord.push(row.x_coord);
        y_coord.push(row.y_coord);
        shot_type.push(row.shot_type);
        shooting_or_scoring_player_id.push(row.shooting_or_scoring_player_id);
        goalie_player_id.push(row.goalie_player_id);
        empty_net.push(row.empty_net);
        shot_distance.push(row.shot_distance);
        danger_zone.push(row.danger_zone);
        rebound.push(row.rebound);
        shot_off_rush.push(row.shot_off_rush);
        time_between_shots.push(row.time_between_shots);
    }

    DataFrame::new(vec![
        Series::new("game_id", game_id),
        Series::new("period", period),
        Series::new("time_in_period", time_in_period),
        Series::new("event_type", event_type),
        Series::new("team_id", team_id),
        Series::new("x_coord", x_coord),
        Series::new("y_coord", y_coord),
        Series::new("shot_type", shot_type),
        Series::new(
            "shooting_or_scoring_player_id",
            shooting_or_scoring_player_id,
        ),
        Series::new("goalie_player_id", goalie_player_id),
        Series::new("empty_net", empty_net),
        Series::new("shot_distance", shot_distance),
        Series::new("danger_zone", danger_zone),
        Series::new("rebound", rebound),
        Series::new("shot_off_rush", shot_off_rush),
        Series::new("time_between_shots", time_between_shots),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn play(type_key: &str, period: i64, clock: &str, team_id: i64) -> Value {
        json!({
            "typeDescKey": type_key,
            "periodDescriptor": { "number": period },
            "timeInPeriod": clock,
            "details": { "eventOwnerTeamId": team_id },
        })
    }

    #[test]
    fn context_rows_feed_the_scan_then_drop_out() {
        let plays = vec![
            play("takeaway", 1, "00:05", 1),
            play("shot-on-goal", 1, "00:12", 1),
        ];

        let rows = process_game(2016020001, &plays, &TidyOptions::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "shot");
        assert!(rows[0].shot_off_rush);
        assert!(!rows[0].rebound);
        assert_eq!(rows[0].time_between_shots, 0);
    }

    #[test]
    fn output_row_count_never_exceeds_event_count() {
        let plays = vec![
            play("faceoff", 1, "00:00", 1),
            play("takeaway", 1, "05:00", 2),
            play("giveaway", 1, "06:00", 1),
        ];

        let rows = process_game(1, &plays, &TidyOptions::default());
        assert!(rows.is_empty());
    }

    #[test]
    fn scan_state_resets_at_period_boundaries() {
        let plays = vec![
            play("shot-on-goal", 1, "19:55", 7),
            play("shot-on-goal", 2, "00:03", 7),
        ];

        let rows = process_game(1, &plays, &TidyOptions::default());
        assert_eq!(rows.len(), 2);
        assert!(!rows[1].rebound);
        assert_eq!(rows[1].time_between_shots, 0);
    }

    #[test]
    fn unsorted_input_is_resorted_before_the_scan() {
        let sorted = vec![
            play("shot-on-goal", 1, "01:40", 7),
            play("shot-on-goal", 1, "01:45", 7),
        ];
        let scrambled = vec![sorted[1].clone(), sorted[0].clone()];

        let from_sorted = process_game(1, &sorted, &TidyOptions::default());
        let from_scrambled = process_game(1, &scrambled, &TidyOptions::default());

        assert_eq!(from_sorted, from_scrambled);
        assert!(from_sorted[1].rebound);
        assert_eq!(from_sorted[1].time_between_shots, 5);
    }

    #[test]
    fn spatial_features_attach_to_shot_rows() {
        let plays = vec![json!({
            "typeDescKey": "goal",
            "periodDescriptor": { "number": 1 },
            "timeInPeriod": "02:00",
            "details": { "eventOwnerTeamId": 3, "xCoord": 3.0, "yCoord": 4.0 },
        })];

        let rows = process_game(1, &plays, &TidyOptions::default());
        assert_eq!(rows[0].shot_distance, Some(5.0));
        assert_eq!(rows[0].danger_zone, "High");
    }

    #[test]
    fn processing_is_deterministic() {
        let plays = vec![
            play("takeaway", 1, "00:05", 1),
            play("shot-on-goal", 1, "00:12", 1),
            play("goal", 2, "10:00", 2),
            play("shot-on-goal", 2, "10:08", 2),
        ];

        let first = process_game(9, &plays, &TidyOptions::default());
        let second = process_game(9, &plays, &TidyOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_dataset_keeps_the_full_schema() {
        let df = build_dataframe(Vec::new()).unwrap();
        assert_eq!(df.shape(), (0, 16));
        assert_eq!(
            df.get_column_names(),
            vec![
                "game_id",
                "period",
                "time_in_period",
                "event_type",
                "team_id",
                "x_coord",
                "y_coord",
                "shot_type",
                "shooting_or_scoring_player_id",
                "goalie_player_id",
                "empty_net",
                "shot_distance",
                "danger_zone",
                "rebound",
                "shot_off_rush",
                "time_between_shots",
            ]
        );
    }

    #[test]
    fn aggregator_skips_broken_files_and_zero_shot_games() {
        let dir = tempfile::tempdir().unwrap();

        let game = json!({
            "id": 2016020001,
            "plays": [
                play("shot-on-goal", 1, "01:00", 10),
                play("shot-on-goal", 1, "01:05", 10),
            ],
        });
        fs::write(
            dir.path().join("2016020001.json"),
            serde_json::to_vec_pretty(&game).unwrap(),
        )
        .unwrap();

        let quiet_game = json!({
            "id": 2016020002,
            "plays": [play("takeaway", 1, "03:00", 10)],
        });
        fs::write(
            dir.path().join("2016020002.json"),
            serde_json::to_vec_pretty(&quiet_game).unwrap(),
        )
        .unwrap();

        fs::write(dir.path().join("2016020003.json"), b"not json at all").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let out = dir.path().join("tidy.csv");
        extract_tidy(dir.path(), &out, "csv", &TidyOptions::default()).unwrap();

        let written = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("game_id,period,time_in_period,event_type"));
        assert!(lines[2].contains("true"));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("tidy.xlsx");
        let result = extract_tidy(dir.path(), &out, "xlsx", &TidyOptions::default());
        assert!(result.is_err());
    }
}
