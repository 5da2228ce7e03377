//! Scanner integration tests against an in-memory candle source

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use coinscan::error::{AnalysisError, AnalysisResult};
    use coinscan::market_data::CandleSource;
    use coinscan::scanner::{
        composite_from, MultiTimeframeAnalyzer, ScanCache, ScanEvent, ScanRequest, Scanner,
    };
    use coinscan::types::{Candle, Timeframe};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::{mpsc, watch};
    use tokio_test::{assert_err, assert_ok};

    // ============================================================================
    // Fixtures
    // ============================================================================

    #[derive(Clone, Copy)]
    enum Behavior {
        /// Full history with the given drift per candle
        Healthy(f64),
        /// Returns fewer candles than requested
        Short(usize),
        /// Connection failure on every attempt
        Down,
        /// Never answers within a reasonable timeout
        Stalled,
    }

    struct FakeSource {
        instruments: Vec<String>,
        behaviors: HashMap<String, Behavior>,
        list_calls: AtomicUsize,
        fetches: AtomicUsize,
        /// Flipped to `true` on the first fetch
        cancel_on_fetch: Mutex<Option<watch::Sender<bool>>>,
    }

    impl FakeSource {
        fn new(entries: &[(&str, Behavior)]) -> Self {
            Self {
                instruments: entries.iter().map(|(s, _)| s.to_string()).collect(),
                behaviors: entries.iter().map(|(s, b)| (s.to_string(), *b)).collect(),
                list_calls: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
                cancel_on_fetch: Mutex::new(None),
            }
        }

        fn healthy(n: usize) -> Self {
            let names: Vec<String> = (0..n).map(|i| format!("COIN{}USDT", i)).collect();
            let entries: Vec<(&str, Behavior)> = names
                .iter()
                .enumerate()
                .map(|(i, s)| (s.as_str(), Behavior::Healthy(i as f64 * 0.05 - 0.2)))
                .collect();
            Self::new(&entries)
        }
    }

    #[async_trait]
    impl CandleSource for FakeSource {
        fn name(&self) -> &'static str {
            "Fake"
        }

        async fn fetch_candles(
            &self,
            symbol: &str,
            timeframe: Timeframe,
            count: usize,
        ) -> AnalysisResult<Vec<Candle>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let cancel = self.cancel_on_fetch.lock().unwrap().take();
            if let Some(tx) = cancel {
                let _ = tx.send(true);
            }

            match self.behaviors.get(symbol).copied() {
                Some(Behavior::Healthy(drift)) => Ok(make_candles(count, drift)),
                Some(Behavior::Short(n)) => Ok(make_candles(n, 0.0)),
                Some(Behavior::Stalled) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(make_candles(count, 0.0))
                }
                Some(Behavior::Down) | None => Err(AnalysisError::DataSourceUnavailable {
                    symbol: symbol.to_string(),
                    timeframe,
                    reason: "connection refused".to_string(),
                }),
            }
        }

        async fn list_instruments(&self) -> AnalysisResult<Vec<String>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.instruments.clone())
        }
    }

    fn make_candles(n: usize, drift: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                let close = 100.0 + (t * 0.21).sin() * 6.0 + (t * 0.05).cos() * 3.0 + drift * t;
                Candle {
                    open_time: 1700000000000 + i as i64 * 60_000,
                    open: close - 0.4,
                    high: close + 1.2,
                    low: close - 1.1,
                    close,
                    volume: 800.0 + ((i * 37) % 11) as f64 * 40.0,
                }
            })
            .collect()
    }

    fn scanner_for(source: Arc<FakeSource>) -> Scanner {
        let analyzer = MultiTimeframeAnalyzer::new(source, Timeframe::DEFAULT_SET.to_vec())
            .with_pacing(Duration::ZERO)
            .with_fetch_policy(Duration::from_secs(1), 1);
        Scanner::new(analyzer).with_concurrency(4)
    }

    fn drain(rx: &mut mpsc::Receiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // ============================================================================
    // Analyzer
    // ============================================================================

    #[tokio::test]
    async fn test_analysis_is_deterministic() {
        let source = Arc::new(FakeSource::healthy(1));
        let scanner = scanner_for(source);

        let first = assert_ok!(scanner.analyzer().analyze("COIN0USDT").await);
        let second = assert_ok!(scanner.analyzer().analyze("COIN0USDT").await);

        assert_eq!(first.score, second.score);
        assert_eq!(first.fields, second.fields);
        assert_eq!(first.levels, second.levels);
        assert!(first.score >= 0.0 && first.score <= 17.0);
    }

    #[tokio::test]
    async fn test_composite_matches_fold_of_timeframes() {
        let source = Arc::new(FakeSource::healthy(1));
        let scanner = scanner_for(source);
        let composite = assert_ok!(scanner.analyzer().analyze("COIN0USDT").await);

        let mean = composite
            .timeframe_scores
            .iter()
            .map(|(_, s)| *s as f64)
            .sum::<f64>()
            / composite.timeframe_scores.len() as f64;
        assert_eq!(composite.score, mean);
        assert!(composite.levels.support <= composite.levels.resistance);
        assert!(composite.levels.fib_0 <= composite.levels.fib_100);
    }

    #[test]
    fn test_composite_of_empty_results() {
        assert!(composite_from("COIN0USDT", Vec::new()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_fetch_times_out() {
        let source = Arc::new(FakeSource::new(&[("SLOWUSDT", Behavior::Stalled)]));
        let scanner = scanner_for(source.clone());

        let err = assert_err!(scanner.analyzer().analyze("SLOWUSDT").await);
        assert!(err.is_transient());
        // One attempt plus one retry
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    // ============================================================================
    // Scanner
    // ============================================================================

    #[tokio::test]
    async fn test_scan_respects_max_instruments() {
        let source = Arc::new(FakeSource::healthy(10));
        let scanner = scanner_for(source.clone());

        let results = assert_ok!(scanner.scan(0.0, 3).await);
        assert_eq!(results.len(), 3);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 9);

        // Exchange order is kept before truncation
        let mut symbols: Vec<&str> = results.iter().map(|r| r.symbol.as_str()).collect();
        symbols.sort();
        assert_eq!(symbols, vec!["COIN0USDT", "COIN1USDT", "COIN2USDT"]);
    }

    #[tokio::test]
    async fn test_scan_never_returns_below_min_score() {
        let source = Arc::new(FakeSource::healthy(8));
        let scanner = scanner_for(source);

        let all = assert_ok!(scanner.scan(0.0, 8).await);
        assert_eq!(all.len(), 8);

        let threshold = all.iter().map(|r| r.score).sum::<f64>() / all.len() as f64;
        let filtered = assert_ok!(scanner.scan(threshold, 8).await);
        assert!(filtered.len() <= all.len());
        assert!(filtered.iter().all(|r| r.score >= threshold));

        let none = assert_ok!(scanner.scan(100.0, 8).await);
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_failed_instruments_are_skipped() {
        let source = Arc::new(FakeSource::new(&[
            ("GOODUSDT", Behavior::Healthy(0.1)),
            ("NEWUSDT", Behavior::Short(150)),
            ("DOWNUSDT", Behavior::Down),
        ]));
        let (tx, mut rx) = mpsc::channel(64);
        let scanner = scanner_for(source).with_event_sink(tx);

        let results = assert_ok!(scanner.scan(0.0, 10).await);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "GOODUSDT");

        drop(scanner);
        let events = drain(&mut rx);
        let skipped: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Skipped { symbol, .. } => Some(symbol.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(skipped.len(), 2);
        assert!(skipped.contains(&"NEWUSDT"));
        assert!(skipped.contains(&"DOWNUSDT"));
        assert!(matches!(
            events.last(),
            Some(ScanEvent::Finished {
                scanned: 3,
                qualified: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_scan_universe_uses_given_symbols() {
        let source = Arc::new(FakeSource::healthy(5));
        let scanner = scanner_for(source.clone());

        let symbols = vec!["COIN4USDT".to_string(), "COIN1USDT".to_string()];
        let results = scanner.scan_universe(symbols, 0.0, 10).await;

        assert_eq!(results.len(), 2);
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 0);
    }

    // ============================================================================
    // Cancellation
    // ============================================================================

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = Arc::new(FakeSource::healthy(5));
        let (_cancel_tx, cancel_rx) = watch::channel(true);
        let (tx, mut rx) = mpsc::channel(64);
        let scanner = scanner_for(source.clone())
            .with_event_sink(tx)
            .with_cancellation(cancel_rx);

        let results = assert_ok!(scanner.scan(0.0, 5).await);
        assert!(results.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);

        drop(scanner);
        assert!(matches!(
            drain(&mut rx).last(),
            Some(ScanEvent::Finished {
                scanned: 0,
                qualified: 0
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_lets_in_flight_instrument_finish() {
        let source = Arc::new(FakeSource::healthy(5));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        *source.cancel_on_fetch.lock().unwrap() = Some(cancel_tx);

        let scanner = scanner_for(source.clone())
            .with_concurrency(1)
            .with_cancellation(cancel_rx);

        let results = assert_ok!(scanner.scan(0.0, 5).await);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "COIN0USDT");
        // All three timeframes of the first instrument, nothing after
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    // ============================================================================
    // Cache
    // ============================================================================

    fn request(min_score: f64) -> ScanRequest {
        ScanRequest {
            min_score,
            max_instruments: 4,
        }
    }

    #[tokio::test]
    async fn test_fresh_cache_is_reused() {
        let source = Arc::new(FakeSource::healthy(4));
        let scanner = scanner_for(source.clone()).with_cache_ttl(Duration::from_secs(300));

        let cache = assert_ok!(scanner.scan_cached(None, request(0.0), false).await);
        assert_eq!(cache.results().len(), 4);
        let scanned_at = cache.scanned_at();

        let cache = assert_ok!(scanner.scan_cached(Some(cache), request(0.0), false).await);
        assert_eq!(cache.scanned_at(), scanned_at);
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 1);
        assert!(cache.find("coin2usdt").is_some());
    }

    #[tokio::test]
    async fn test_forced_refresh_rescans() {
        let source = Arc::new(FakeSource::healthy(4));
        let scanner = scanner_for(source.clone());

        let cache = assert_ok!(scanner.scan_cached(None, request(0.0), false).await);
        let _ = assert_ok!(scanner.scan_cached(Some(cache), request(0.0), true).await);
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_changed_request_rescans() {
        let source = Arc::new(FakeSource::healthy(4));
        let scanner = scanner_for(source.clone());

        let cache = assert_ok!(scanner.scan_cached(None, request(0.0), false).await);
        let cache = assert_ok!(scanner.scan_cached(Some(cache), request(100.0), false).await);
        assert_eq!(*cache.request(), request(100.0));
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);

        // Empty results are never served from cache
        let _ = assert_ok!(scanner.scan_cached(Some(cache), request(100.0), false).await);
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_expired_cache_rescans() {
        let source = Arc::new(FakeSource::healthy(4));
        let scanner = scanner_for(source.clone());

        let stale = ScanCache::at(
            request(0.0),
            assert_ok!(scanner.scan(0.0, 4).await),
            Duration::from_secs(300),
            chrono::Utc::now() - chrono::Duration::seconds(301),
        );
        let fresh = assert_ok!(scanner.scan_cached(Some(stale), request(0.0), false).await);
        assert!(fresh.is_fresh());
        assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
    }
}
