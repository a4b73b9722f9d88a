use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use std::collections::VecDeque;
use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::thread::sleep;
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://api-web.nhle.com/v1";
const DEFAULT_MAX_REQS_PER_SEC: usize = 10;
static GLOBAL_RATE_LIMITER: OnceLock<Mutex<RateLimiter>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    Regular,
    Playoffs,
}

impl GameKind {
    pub fn code(self) -> i64 {
        match self {
            GameKind::Regular => 2,
            GameKind::Playoffs => 3,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "02" => Some(GameKind::Regular),
            "03" => Some(GameKind::Playoffs),
            _ => None,
        }
    }

    // Largest game number the league schedules for this kind; downloads stop
    // earlier at the first 404.
    pub fn schedule_cap(self) -> u32 {
        match self {
            GameKind::Regular => 1271,
            GameKind::Playoffs => 131,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GameKind::Regular => "regular season",
            GameKind::Playoffs => "playoffs",
        }
    }
}

// Game ids pack season, type and number: 2016020001 is game 1 of the
// 2016-17 regular season.
pub fn format_game_id(season_start_year: i64, kind: GameKind, game_number: u32) -> i64 {
    season_start_year * 1_000_000 + kind.code() * 10_000 + game_number as i64
}

pub fn season_of(game_id: i64) -> i64 {
    game_id / 1_000_000
}

pub fn kind_of(game_id: i64) -> Option<GameKind> {
    match (game_id / 10_000) % 100 {
        2 => Some(GameKind::Regular),
        3 => Some(GameKind::Playoffs),
        _ => None,
    }
}

pub fn default_data_dir() -> PathBuf {
    env::var("NHL_DATA_FOLDER")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./nhl_data"))
}

pub struct NhlClient {
    client: Client,
}

impl NhlClient {
    pub fn new() -> Self {
        global_rate_limiter();

        Self {
            client: Client::new(),
        }
    }

    pub fn new_with_max(max_reqs_per_sec: usize) -> Self {
        {
            let limiter = global_rate_limiter();
            let mut guard = limiter
                .lock()
                .expect("Rate limiter mutex poisoned while setting max");
            guard.set_max_reqs_per_sec(max_reqs_per_sec);
        }

        Self {
            client: Client::new(),
        }
    }

    // Ok(None) means the game does not exist; the endpoint 404s past the
    // end of a season's schedule.
    pub fn get_play_by_play(&self, game_id: i64) -> Result<Option<Value>, Box<dyn Error>> {
        let url = format!("{}/gamecenter/{}/play-by-play", BASE_URL, game_id);

        let Some(response) = self.request_with_retry(&url)? else {
            return Ok(None);
        };
        Ok(Some(response.json()?))
    }

    fn request_with_retry(
        &self,
        url: &str,
    ) -> Result<Option<reqwest::blocking::Response>, Box<dyn Error>> {
        const MAX_ATTEMPTS: usize = 2;
        let mut attempt = 0;

        loop {
            attempt += 1;

            wait_global_rate_limit();

            let response = self.client.get(url).send()?;

            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_ATTEMPTS {
                    return Err(format!("Too many requests for URL {}", url).into());
                }

                if let Some(retry_after) = parse_retry_after(&response) {
                    sleep(retry_after);
                } else {
                    sleep(Duration::from_secs(10));
                }

                continue;
            }

            if !response.status().is_success() {
                return Err(format!(
                    "Request to {} failed with status {}",
                    url,
                    response.status()
                )
                .into());
            }

            return Ok(Some(response));
        }
    }
}

// Returns the cached copy of a game when one exists, otherwise fetches and
// writes it. Re-fetching a cached game never touches the network.
pub fn fetch_or_cache(
    client: &NhlClient,
    game_id: i64,
    cache_dir: &Path,
) -> Result<Option<Value>, Box<dyn Error>> {
    let cache_file = cache_dir.join(format!("{}.json", game_id));

    if cache_file.exists() {
        let contents = fs::read_to_string(&cache_file)?;
        return Ok(Some(serde_json::from_str(&contents)?));
    }

    let Some(game) = client.get_play_by_play(game_id)? else {
        return Ok(None);
    };

    save_game(cache_dir, game_id, &game)?;
    Ok(Some(game))
}

#[derive(Debug, Clone)]
pub struct DownloadArgs {
    pub start_season: i64,
    pub end_season: i64,
    pub game_kinds: Vec<GameKind>,
    pub out_dir: PathBuf,
    pub max_games: Option<u32>,
    pub max_reqs_per_sec: Option<usize>,
}

pub fn download_games(args: &DownloadArgs) -> Result<(), Box<dyn Error>> {
    if args.game_kinds.is_empty() {
        return Err("You must request at least one game type (02 and/or 03)".into());
    }

    fs::create_dir_all(&args.out_dir)?;

    let client = match args.max_reqs_per_sec {
        Some(max) => NhlClient::new_with_max(max),
        None => NhlClient::new(),
    };
    let mut fetched = 0usize;
    let mut cached = 0usize;

    for season in args.start_season..=args.end_season {
        for kind in &args.game_kinds {
            let cap = args.max_games.unwrap_or(kind.schedule_cap());

            for game_number in 1..=cap {
                let game_id = format_game_id(season, *kind, game_number);
                let cache_file = args.out_dir.join(format!("{}.json", game_id));

                if cache_file.exists() {
                    cached += 1;
                    continue;
                }

                match fetch_or_cache(&client, game_id, &args.out_dir) {
                    Ok(Some(_)) => {
                        fetched += 1;
                    }
                    Ok(None) => {
                        eprintln!(
                            "Game {} not found, assuming end of the {}-{:02} {} schedule",
                            game_id,
                            season,
                            (season + 1) % 100,
                            kind.label()
                        );
                        break;
                    }
                    Err(err) => {
                        eprintln!("Failed to fetch game {}: {}", game_id, err);
                        break;
                    }
                }
            }

            eprintln!(
                "Season {} {}: {} fetched, {} already cached so far",
                season,
                kind.label(),
                fetched,
                cached
            );
        }
    }

    eprintln!(
        "Download complete: {} games fetched, {} served from cache",
        fetched, cached
    );

    Ok(())
}

fn save_game(out_dir: &Path, game_id: i64, game: &Value) -> Result<(), Box<dyn Error>> {
    let serialized = serde_json::to_vec_pretty(game)?;
    let file_path = out_dir.join(format!("{}.json", game_id));
    fs::write(file_path, serialized)?;
    Ok(())
}

pub struct RateLimiter {
    max_reqs_per_sec: usize,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_reqs_per_sec: usize) -> Self {
        Self {
            max_reqs_per_sec,
            timestamps: VecDeque::new(),
        }
    }

    pub fn set_max_reqs_per_sec(&mut self, max_reqs_per_sec: usize) {
        self.max_reqs_per_sec = max_reqs_per_sec;
    }

    pub fn wait(&mut self) {
        loop {
            let now = Instant::now();
            self.prune(now);

            if self.timestamps.len() >= self.max_reqs_per_sec {
                if let Some(oldest) = self.timestamps.front() {
                    let elapsed = now.duration_since(*oldest);
                    if elapsed < Duration::from_secs(1) {
                        sleep(Duration::from_secs(1) - elapsed);
                        continue;
                    }
                }
            }

            self.timestamps.push_back(Instant::now());
            break;
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) > Duration::from_secs(1) {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

fn global_rate_limiter() -> &'static Mutex<RateLimiter> {
    GLOBAL_RATE_LIMITER.get_or_init(|| Mutex::new(RateLimiter::new(DEFAULT_MAX_REQS_PER_SEC)))
}

fn wait_global_rate_limit() {
    let limiter = global_rate_limiter();
    let mut guard = limiter
        .lock()
        .expect("Rate limiter mutex poisoned while waiting");
    guard.wait();
}

fn parse_retry_after(response: &reqwest::blocking::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}
