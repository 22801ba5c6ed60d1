use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::info;

use campus_alert::{GeocodeResult, LocationCatalog, LocationResolver};

use super::shared::{JsonlSink, optional_env};

#[derive(Serialize)]
struct GeocodeLine<'a> {
    text: &'a str,
    #[serde(flatten)]
    result: GeocodeResult,
}

/// Resolve one location per input line.
pub(super) async fn run() -> Result<()> {
    let resolver = LocationResolver::from_env(LocationCatalog::from_env().into_shared());
    info!("Resolver: {resolver}");
    let mut sink = JsonlSink::from_env()?;

    let mut lines = match optional_env("GEOCODE_INPUT_PATH") {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open geocode input {path}"))?;
            let reader: Box<dyn io::AsyncBufRead + Unpin + Send> = Box::new(BufReader::new(file));
            reader.lines()
        }
        None => {
            let reader: Box<dyn io::AsyncBufRead + Unpin + Send> =
                Box::new(BufReader::new(io::stdin()));
            reader.lines()
        }
    };

    let mut resolved = 0usize;
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        sink.write(&GeocodeLine {
            text,
            result: resolver.resolve(text),
        })?;
        resolved += 1;
    }
    sink.finish()?;

    info!("Geocoding complete: resolved={resolved}");
    Ok(())
}
