use std::{env, path::PathBuf};

use chrono::NaiveTime;

use crate::{errors::Error, Result};

/// Hour of day (UTC) at which daily memes are delivered.
pub const DAILY_MEME_HOUR: u32 = 9;

const MEMES_DIR_NAME: &str = "memes";

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub memes_dir: PathBuf,
    /// Wall-clock time (UTC) of the daily delivery.
    pub daily_meme_time: NaiveTime,
}

impl Config {
    /// Load configuration from the process environment (and `.env`, if present).
    pub fn load() -> Result<Self> {
        load_env_file()?;
        Self::from_values(env_str("TELEGRAM_BOT_TOKEN"), env_path("MEMES_DIR"))
    }

    fn from_values(token: Option<String>, memes_dir: Option<PathBuf>) -> Result<Self> {
        let telegram_bot_token = token.and_then(non_empty).ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is not set".to_string())
        })?;

        let memes_dir = memes_dir.unwrap_or_else(default_memes_dir);

        Ok(Self {
            telegram_bot_token,
            memes_dir,
            daily_meme_time: daily_meme_time(),
        })
    }
}

pub fn daily_meme_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DAILY_MEME_HOUR, 0, 0).unwrap_or_default()
}

/// `memes/` beside the executable when it exists, else under the working directory.
fn default_memes_dir() -> PathBuf {
    let beside_exe = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(MEMES_DIR_NAME)));

    match beside_exe {
        Some(dir) if dir.is_dir() => dir,
        _ => PathBuf::from(MEMES_DIR_NAME),
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Load `.env` from the working directory into the process environment.
///
/// Existing variables win. Must run before `logging::init` so `RUST_LOG`
/// from the file reaches the log filter.
pub fn load_env_file() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(Error::Config(format!("failed to read .env: {e}"))),
    }
}

/// Like [`load_env_file`], from an explicit path.
pub fn load_env_file_from(path: &std::path::Path) -> Result<()> {
    dotenvy::from_path(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
