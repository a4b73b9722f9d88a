use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

mod event;
mod features;
mod nhl_api;
mod summary;
mod tidy;

#[derive(Parser, Debug)]
#[command(
    name = "nhl-rust-api",
    about = "CLI for NHL play-by-play tidy datasets",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download play-by-play JSON into the local cache
    Download {
        /// First season start year to fetch (e.g. 2016 for 2016-17)
        #[arg(long)]
        start_season: i64,

        /// Last season start year, defaults to the start season
        #[arg(long)]
        end_season: Option<i64>,

        /// Comma-separated game-type codes: 02 regular season, 03 playoffs
        #[arg(long, default_value = "02,03")]
        game_types: String,

        /// Cache directory, defaults to $NHL_DATA_FOLDER or ./nhl_data
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Cap on game numbers per season and type
        #[arg(long)]
        max_games: Option<u32>,

        /// Politeness cap on requests per second
        #[arg(long)]
        max_reqs_per_sec: Option<usize>,
    },

    /// Flatten cached games into a tidy shot/goal dataset
    Tidy {
        /// Directory of cached game JSON, defaults to $NHL_DATA_FOLDER or ./nhl_data
        raw_dir: Option<PathBuf>,

        /// Output file path
        #[arg(long)]
        out: PathBuf,

        /// Output format: parquet or csv
        #[arg(long, default_value = "parquet")]
        format: String,

        /// Scope time-between-shots to the shooting team instead of the whole period
        #[arg(long)]
        team_scoped_shot_gap: bool,
    },

    /// Print aggregate statistics for raw games or a tidy dataset
    Summary {
        #[command(subcommand)]
        target: SummaryTarget,
    },
}

#[derive(Subcommand, Debug)]
enum SummaryTarget {
    /// Summarize a directory of raw game JSON
    Raw {
        /// Directory of cached game JSON, defaults to $NHL_DATA_FOLDER or ./nhl_data
        dir: Option<PathBuf>,

        /// Stop after this many game files
        #[arg(long)]
        max_files: Option<usize>,
    },

    /// Summarize a tidy parquet dataset
    Tidy {
        /// Path to the tidy parquet file
        parquet: PathBuf,

        /// Only read the first N rows
        #[arg(long)]
        max_rows: Option<usize>,
    },
}

fn main() {
    let args = Cli::parse();

    match args.command {
        Command::Download {
            start_season,
            end_season,
            game_types,
            out_dir,
            max_games,
            max_reqs_per_sec,
        } => {
            let game_kinds: Vec<nhl_api::GameKind> = game_types
                .split(',')
                .filter_map(nhl_api::GameKind::from_code)
                .collect();

            let download_args = nhl_api::DownloadArgs {
                start_season,
                end_season: end_season.unwrap_or(start_season),
                game_kinds,
                out_dir: out_dir.unwrap_or_else(nhl_api::default_data_dir),
                max_games,
                max_reqs_per_sec,
            };

            if let Err(err) = nhl_api::download_games(&download_args) {
                eprintln!("Download failed: {}", err);
                process::exit(1);
            }
        }

        Command::Tidy {
            raw_dir,
            out,
            format,
            team_scoped_shot_gap,
        } => {
            let raw_dir = raw_dir.unwrap_or_else(nhl_api::default_data_dir);
            let options = tidy::TidyOptions {
                team_scoped_shot_gap,
            };

            if let Err(err) = tidy::extract_tidy(&raw_dir, &out, &format, &options) {
                eprintln!("Tidy extraction failed: {}", err);
                process::exit(1);
            }
        }

        Command::Summary { target } => {
            let result = match target {
                SummaryTarget::Raw { dir, max_files } => {
                    let dir = dir.unwrap_or_else(nhl_api::default_data_dir);
                    summary::summary_raw(&dir, max_files)
                }
                SummaryTarget::Tidy { parquet, max_rows } => {
                    summary::summary_tidy(&parquet, max_rows)
                }
            };

            if let Err(err) = result {
                eprintln!("Summary failed: {}", err);
                process::exit(1);
            }
        }
    }
}
