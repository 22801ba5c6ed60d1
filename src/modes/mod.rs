mod dispatch;
mod geocode;
mod plan;
mod shared;

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Plan,
    Geocode,
    Dispatch,
}

impl RunMode {
    fn from_env() -> Self {
        let raw = std::env::var("RUN_MODE").unwrap_or_else(|_| "plan".into());
        match raw.trim().to_lowercase().as_str() {
            "geocode" | "resolve" => Self::Geocode,
            "dispatch" | "deliver" => Self::Dispatch,
            _ => Self::Plan,
        }
    }
}

pub async fn run_from_env() -> Result<()> {
    match RunMode::from_env() {
        RunMode::Plan => plan::run().await,
        RunMode::Geocode => geocode::run().await,
        RunMode::Dispatch => dispatch::run().await,
    }
}
