use anyhow::{Context, Result};
use async_trait::async_trait;
use flash_wick_core::{Feed, Kline};
use serde::Deserialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

/// One feed event: the pair plus the candle fields, on a single line.
#[derive(Debug, Deserialize)]
struct FeedEvent {
    pair: String,
    #[serde(flatten)]
    kline: Kline,
}

/// Reads `(pair, kline)` events from JSON lines, one event per line.
///
/// Malformed lines are logged and skipped so a damaged capture does not
/// abort a replay.
pub struct JsonlFeed<R> {
    lines: Lines<R>,
}

impl JsonlFeed<BufReader<File>> {
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .with_context(|| format!("opening feed file {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl JsonlFeed<BufReader<Stdin>> {
    #[must_use]
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl<R> Feed for JsonlFeed<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_kline(&mut self) -> Result<Option<(String, Kline)>> {
        while let Some(line) = self.lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedEvent>(trimmed) {
                Ok(event) => return Ok(Some((event.pair, event.kline))),
                Err(err) => tracing::warn!(%err, "skipping malformed feed line"),
            }
        }
        Ok(None)
    }
}
