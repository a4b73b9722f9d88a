use anyhow::Result;
use chrono::NaiveDate;
use polars::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::nhl_api::{self, GameKind};

pub fn summary_raw(raw_dir: &Path, max_files: Option<usize>) -> Result<()> {
    println!("== Play-by-play summary (raw JSON) ==");

    let mut to_visit = vec![raw_dir.to_path_buf()];
    let mut games = 0usize;
    let mut plays_total = 0usize;
    let mut type_counts: HashMap<String, usize> = HashMap::new();
    let mut season_counts: HashMap<i64, usize> = HashMap::new();
    let mut regular = 0usize;
    let mut playoffs = 0usize;
    let mut min_game_date: Option<NaiveDate> = None;
    let mut max_game_date: Option<NaiveDate> = None;

    while let Some(path) = to_visit.pop() {
        if let Some(limit) = max_files {
            if games >= limit {
                break;
            }
        }

        if path.is_dir() {
            if let Ok(entries) = fs::read_dir(&path) {
                for entry in entries.flatten() {
                    let p = entry.path();
                    if p.is_dir() {
                        to_visit.push(p);
                    } else if p.extension().and_then(|e| e.to_str()) == Some("json") {
                        let contents = match fs::read_to_string(&p) {
                            Ok(data) => data,
                            Err(_) => continue,
                        };

                        let parsed: Value = match serde_json::from_str(&contents) {
                            Ok(v) => v,
                            Err(_) => continue,
                        };

                        let Some(plays) = parsed.get("plays").and_then(|p| p.as_array()) else {
                            continue;
                        };

                        plays_total += plays.len();
                        for play in plays {
                            if let Some(key) = play.get("typeDescKey").and_then(|v| v.as_str()) {
                                *type_counts.entry(key.to_string()).or_insert(0) += 1;
                            }
                        }

                        if let Some(game_id) = parsed.get("id").and_then(|v| v.as_i64()) {
                            *season_counts.entry(nhl_api::season_of(game_id)).or_insert(0) += 1;
                            match nhl_api::kind_of(game_id) {
                                Some(GameKind::Regular) => regular += 1,
                                Some(GameKind::Playoffs) => playoffs += 1,
                                None => {}
                            }
                        }

                        if let Some(date) = parsed
                            .get("gameDate")
                            .and_then(|v| v.as_str())
                            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                        {
                            min_game_date = Some(match min_game_date {
                                Some(current) => current.min(date),
                                None => date,
                            });
                            max_game_date = Some(match max_game_date {
                                Some(current) => current.max(date),
                                None => date,
                            });
                        }

                        games += 1;

                        if let Some(limit) = max_files {
                            if games >= limit {
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    println!("Games scanned: {}", games);
    println!("Plays counted: {}", plays_total);
    println!("Game types: regular={} playoffs={}", regular, playoffs);

    if let (Some(min_season), Some(max_season)) =
        (season_counts.keys().min(), season_counts.keys().max())
    {
        println!(
            "Seasons: {} -> {} ({} seasons)",
            min_season,
            max_season,
            season_counts.len()
        );
    }

    if let (Some(min_date), Some(max_date)) = (min_game_date, max_game_date) {
        println!("Game dates: {} -> {}", min_date, max_date);
    }

    if !type_counts.is_empty() {
        let mut types: Vec<_> = type_counts.into_iter().collect();
        types.sort_by(|a, b| b.1.cmp(&a.1));
        let top = types.into_iter().take(10);
        println!("Top event types:");
        for (event_type, count) in top {
            println!("  {:<24} {}", event_type, count);
        }
    }

    Ok(())
}

pub fn summary_tidy(parquet_path: &Path, max_rows: Option<usize>) -> Result<()> {
    println!("== Tidy dataset summary ==");

    let mut lf = LazyFrame::scan_parquet(
        parquet_path.to_string_lossy().as_ref(),
        ScanArgsParquet::default(),
    )?;
    if let Some(limit) = max_rows {
        lf = lf.limit(limit.try_into().unwrap_or(u32::MAX));
    }

    let basic = lf
        .clone()
        .select([
            len().alias("rows"),
            col("game_id").n_unique().alias("games"),
        ])
        .collect()?;
    println!("Rows / games:\n{}", basic);

    let by_type = lf
        .clone()
        .group_by([col("event_type")])
        .agg([
            len().alias("events"),
            col("shot_distance").mean().alias("avg_distance"),
            col("empty_net")
                .cast(DataType::Float64)
                .mean()
                .alias("empty_net_rate"),
        ])
        .sort(
            "events",
            SortOptions {
                descending: true,
                nulls_last: true,
                ..Default::default()
            },
        )
        .collect()?;
    println!("Shots vs goals:\n{}", by_type);

    let by_zone = lf
        .clone()
        .group_by([col("danger_zone")])
        .agg([
            len().alias("events"),
            col("rebound")
                .cast(DataType::Float64)
                .mean()
                .alias("rebound_rate"),
            col("shot_off_rush")
                .cast(DataType::Float64)
                .mean()
                .alias("rush_rate"),
            col("shot_distance").mean().alias("avg_distance"),
        ])
        .sort(
            "events",
            SortOptions {
                descending: true,
                nulls_last: true,
                ..Default::default()
            },
        )
        .collect()?;
    println!("Danger zones:\n{}", by_zone);

    // The season is the first four digits of the game id.
    let by_season = lf
        .clone()
        .with_column(
            (col("game_id").cast(DataType::Float64) / lit(1_000_000.0))
                .floor()
                .cast(DataType::Int32)
                .alias("season"),
        )
        .group_by([col("season")])
        .agg([
            len().alias("events"),
            col("game_id").n_unique().alias("games"),
            col("rebound")
                .cast(DataType::Float64)
                .mean()
                .alias("rebound_rate"),
            col("time_between_shots")
                .cast(DataType::Float64)
                .mean()
                .alias("avg_shot_gap_secs"),
        ])
        .sort("season", SortOptions::default())
        .collect()?;
    println!("Per season:\n{}", by_season);

    Ok(())
}
