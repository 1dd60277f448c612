use {
    crate::record::Record,
    async_channel::Receiver,
    chrono::{DateTime, Utc},
    influxdb::{Client as DbClient, InfluxDbWriteable},
    log::{debug, error, info, warn},
    std::time::Duration,
    tokio::time::{self, Instant, MissedTickBehavior},
};

pub const MEASUREMENT: &str = "temperatures";

/// Writes older than this mean the data feed has gone stale.
pub const STALE_AFTER: Duration = Duration::from_secs(15 * 60);
const WATCHDOG_PERIOD: Duration = Duration::from_secs(60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracks the last successful write, independent of whether records arrive.
#[derive(Debug, Clone)]
pub struct Watchdog {
    started: Instant,
    last_write: Option<(Instant, DateTime<Utc>)>,
    max_age: Duration,
    alerting: bool,
    alerts: usize,
}

impl Watchdog {
    pub fn new(max_age: Duration) -> Self {
        Self {
            started: Instant::now(),
            last_write: None,
            max_age,
            alerting: false,
            alerts: 0,
        }
    }

    pub fn written(&mut self) {
        self.last_write = Some((Instant::now(), Utc::now()));
        self.alerting = false;
    }

    pub fn last_write(&self) -> Option<DateTime<Utc>> {
        self.last_write.map(|(_, at)| at)
    }

    pub fn alerts(&self) -> usize {
        self.alerts
    }

    /// True once nothing has been written for longer than `max_age`,
    /// counting from startup if nothing was ever written.
    pub fn is_stale(&self) -> bool {
        let since = self.last_write.map_or(self.started, |(at, _)| at);
        since.elapsed() > self.max_age
    }

    /// Returns an alert the first time the feed is seen stale, then stays
    /// quiet until a write succeeds again.
    pub fn check(&mut self) -> Option<String> {
        if !self.is_stale() {
            return None;
        }
        if self.alerting {
            return None;
        }
        self.alerting = true;
        self.alerts += 1;

        let minutes = self.max_age.as_secs() / 60;
        Some(match self.last_write() {
            Some(last) => format!(
                "Last successful write to {} was more than {} minutes ago, at {}",
                MEASUREMENT, minutes, last
            ),
            None => format!(
                "Nothing written to {} in the {} minutes since startup",
                MEASUREMENT, minutes
            ),
        })
    }
}

/// Writes records until the channel closes, returning the watchdog state.
pub async fn run_store(id: String, db: DbClient, records: Receiver<Record>) -> Watchdog {
    let mut watchdog = Watchdog::new(STALE_AFTER);
    let mut ticks = time::interval(WATCHDOG_PERIOD);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = records.recv() => {
                let record = match received {
                    Ok(record) => record,
                    Err(_) => break,
                };
                let query = record.to_row(&id).into_query(MEASUREMENT);

                match time::timeout(WRITE_TIMEOUT, db.query(query)).await {
                    Ok(Ok(_)) => {
                        debug!("Stored record {}", record.rectime);
                        watchdog.written();
                    }
                    Ok(Err(e)) => warn!("Failed to store record {}: {}", record.rectime, e),
                    Err(_) => warn!(
                        "Storing record {} timed out after {}s",
                        record.rectime,
                        WRITE_TIMEOUT.as_secs()
                    ),
                }
            }
            _ = ticks.tick() => {
                if let Some(alert) = watchdog.check() {
                    error!("{}", alert);
                }
            }
        }
    }

    info!("Record channel closed, store task exiting");
    watchdog
}

#[cfg(test)]
mod tests {
    use {super::*, async_channel::bounded, tokio::task};

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn fresh_until_max_age_passes() {
        let mut watchdog = Watchdog::new(STALE_AFTER);
        time::advance(3 * MINUTE).await;
        watchdog.written();

        time::advance(15 * MINUTE).await;
        assert!(!watchdog.is_stale());
        time::advance(MINUTE).await;
        assert!(watchdog.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn never_written_counts_from_startup() {
        let watchdog = Watchdog::new(STALE_AFTER);

        assert_eq!(watchdog.last_write(), None);
        time::advance(15 * MINUTE).await;
        assert!(!watchdog.is_stale());
        time::advance(MINUTE).await;
        assert!(watchdog.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_once_per_outage() {
        let mut watchdog = Watchdog::new(STALE_AFTER);
        assert_eq!(watchdog.check(), None);

        time::advance(16 * MINUTE).await;
        let alert = watchdog.check().unwrap();
        assert!(alert.contains("since startup"), "{}", alert);
        assert_eq!(watchdog.check(), None);

        watchdog.written();
        assert_eq!(watchdog.check(), None);
        assert!(watchdog.last_write().is_some());

        time::advance(16 * MINUTE).await;
        let alert = watchdog.check().unwrap();
        assert!(alert.contains("more than 15 minutes ago"), "{}", alert);
        assert_eq!(watchdog.alerts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_staleness_without_any_records() {
        let db = DbClient::new("http://127.0.0.1:1", "temperatures");
        let (tx, rx) = bounded::<Record>(4);
        let store = task::spawn(run_store("porch".to_string(), db, rx));

        time::sleep(20 * MINUTE).await;
        drop(tx);

        let watchdog = store.await.unwrap();
        assert_eq!(watchdog.alerts(), 1);
        assert_eq!(watchdog.last_write(), None);
    }
}
