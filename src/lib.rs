use {
    crate::{
        aggregate::Reading,
        config::Config,
        record::Record,
        sources::{acquire, ApiSource, LocalSensor, Provider, Source, SOURCES},
    },
    anyhow::{anyhow, Result},
    async_channel::{Sender, TrySendError},
    chrono::Utc,
    influxdb::Client as DbClient,
    log::{info, warn},
    reqwest::Client as HttpClient,
    std::time::Duration,
    tokio::{
        task,
        time::{interval, Interval, MissedTickBehavior},
    },
};

pub mod aggregate;
pub mod config;
pub mod publish;
pub mod record;
pub mod sources;
pub mod store;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const CHANNEL_CAPACITY: usize = 16;

pub struct Sources<W, L> {
    pub darksky: W,
    pub owm: W,
    pub w2: W,
    pub wg: W,
    pub local: L,
}

impl<W: Source, L: Source> Sources<W, L> {
    pub async fn acquire_all(&mut self) -> [Reading; SOURCES] {
        let (darksky, owm, w2, wg, local) = tokio::join!(
            acquire(&mut self.darksky),
            acquire(&mut self.owm),
            acquire(&mut self.w2),
            acquire(&mut self.wg),
            acquire(&mut self.local),
        );

        [darksky, owm, w2, wg, local]
    }
}

pub async fn run() -> Result<()> {
    pretty_env_logger::init();
    color_backtrace::install();

    let config = Config::from_env()?;

    let http = HttpClient::builder().timeout(HTTP_TIMEOUT).build()?;
    let api = |provider: Provider| {
        ApiSource::new(
            provider,
            config.api_key(provider),
            config.latitude.clone(),
            config.longitude.clone(),
            http.clone(),
        )
    };
    let [darksky, owm, w2, wg] = Provider::ALL.map(api);
    let mut sources = Sources {
        darksky,
        owm,
        w2,
        wg,
        local: LocalSensor::initialize(&config.local_sensor, http.clone()),
    };

    info!("INFLUXDB connecting to {}", config.db_url());
    let db_client = DbClient::new(config.db_url(), config.db_name.clone());

    let (store_tx, store_rx) = async_channel::bounded(CHANNEL_CAPACITY);
    task::spawn(store::run_store(config.id.clone(), db_client, store_rx));
    info!("Started store task");

    let mut publish_tx = None;
    if let Some(mqtt) = &config.mqtt {
        let (mqtt_client, eventloop) = publish::connect(&config.id, mqtt);
        task::spawn(publish::run_eventloop(eventloop));

        let (tx, publish_rx) = async_channel::bounded(CHANNEL_CAPACITY);
        task::spawn(publish::run_publish(
            config.id.clone(),
            mqtt_client,
            publish_rx,
        ));
        publish_tx = Some(tx);
        info!("Started publish task");
    }

    info!(
        "Initialization complete, polling every {}s",
        config.interval.as_secs()
    );

    let mut interval = poll_interval(config.interval);
    loop {
        interval.tick().await;

        let time = Utc::now();
        let readings = sources.acquire_all().await;
        let record = Record::new(time, readings);
        info!("{}", record);

        dispatch(record, &store_tx, publish_tx.as_ref()).await?;
    }
}

/// Cycles that overran are not replayed back to back, so `rectime` stays unique.
fn poll_interval(period: Duration) -> Interval {
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Hands a record to the sinks. Storage applies backpressure; the live feed
/// drops records rather than hold up polling.
async fn dispatch(
    record: Record,
    store: &Sender<Record>,
    publish: Option<&Sender<Record>>,
) -> Result<()> {
    if let Some(publish) = publish {
        match publish.try_send(record.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                warn!("Publish queue full, dropping record {}", record.rectime)
            }
            Err(TrySendError::Closed(_)) => return Err(anyhow!("Publish task exited")),
        }
    }

    store
        .send(record)
        .await
        .map_err(|_| anyhow!("Store task exited"))
}
