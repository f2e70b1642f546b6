use anyhow::{Context, Result};
use flash_wick_core::{ConfData, TradeInfo, TradeResult};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct TradeArtifact<'a> {
    conf_line: String,
    pnl: f64,
    #[serde(flatten)]
    result: &'a TradeResult,
}

/// Writes one artifact per finished trade under the configured directory:
/// a JSON summary for completed trades, a text report for stranded ones.
#[derive(Debug, Clone)]
pub struct TradeRecorder {
    path: PathBuf,
}

impl TradeRecorder {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// # Errors
    ///
    /// Returns an error when the artifact cannot be serialized or written.
    pub fn record_trade(&self, conf: &ConfData, result: &TradeResult) -> Result<()> {
        let artifact = TradeArtifact {
            conf_line: conf.line(),
            pnl: result.pnl(),
            result,
        };
        let file = self
            .path
            .join(format!("trade-{}-{}.json", result.pair, result.info.id));
        let body = serde_json::to_string_pretty(&artifact)?;
        std::fs::write(&file, body)
            .with_context(|| format!("writing trade artifact {}", file.display()))?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error when the report cannot be written.
    pub fn record_failure(
        &self,
        conf: &ConfData,
        info: &TradeInfo,
        error: &dyn std::fmt::Display,
    ) -> Result<()> {
        let file = self
            .path
            .join(format!("failure-{}-{}.txt", conf.pair, info.id));
        let body = format!(
            "conf: {}\namount: {}\nquote_amount: {}\nprice: {}\nerror: {}\n",
            conf.line(),
            info.amount,
            info.quote_amount,
            info.price,
            error,
        );
        std::fs::write(&file, body)
            .with_context(|| format!("writing failure report {}", file.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_wick_core::{SellReason, WatcherKind};

    fn conf() -> ConfData {
        ConfData {
            kind: WatcherKind::Price,
            pair: "ETHUSDT".to_string(),
            config: "c".to_string(),
        }
    }

    fn info() -> TradeInfo {
        TradeInfo {
            id: "abc".to_string(),
            amount: 1.0,
            quote_amount: 100.0,
            price: 100.0,
            buy_timestamp: 0,
            bought_timestamp: 0,
            sell_timestamp: 0,
            low: 98.0,
        }
    }

    #[test]
    fn completed_trade_writes_json_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = TradeRecorder::new(dir.path());
        let result = TradeResult {
            info: info(),
            pair: "ETHUSDT".to_string(),
            sold_timestamp: 1,
            sold_amount: 1.0,
            sold_price: 110.0,
            sell_reason: SellReason::Direct,
            sell_strategy: None,
        };
        recorder.record_trade(&conf(), &result).unwrap();

        let body = std::fs::read_to_string(dir.path().join("trade-ETHUSDT-abc.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["conf_line"], "price-ETHUSDT-c");
        assert_eq!(parsed["sell_reason"], "direct");
        assert!((parsed["pnl"].as_f64().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn stranded_trade_writes_text_report() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = TradeRecorder::new(dir.path());
        recorder
            .record_failure(&conf(), &info(), &"sell order failed after 3 attempts")
            .unwrap();

        let body = std::fs::read_to_string(dir.path().join("failure-ETHUSDT-abc.txt")).unwrap();
        assert!(body.contains("price-ETHUSDT-c"));
        assert!(body.contains("after 3 attempts"));
    }
}
