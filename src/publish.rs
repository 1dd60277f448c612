use {
    crate::{config::MqttConfig, record::Record},
    anyhow::{anyhow, Result},
    async_channel::Receiver,
    log::{debug, info, warn},
    rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS},
    std::time::Duration,
    tokio::time,
};

const KEEP_ALIVE: Duration = Duration::from_secs(5);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub fn connect(id: &str, config: &MqttConfig) -> (AsyncClient, EventLoop) {
    info!("MQTT connecting to {}:{}", config.address, config.port);

    let mut mqttoptions = MqttOptions::new(id, config.address.clone(), config.port);
    mqttoptions.set_keep_alive(KEEP_ALIVE);

    AsyncClient::new(mqttoptions, 10)
}

pub async fn run_eventloop(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(event) => debug!("MQTT {:?}", event),
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

pub fn messages(id: &str, record: &Record) -> Vec<(String, String)> {
    let online = record.valid_sources() > 0;

    let mut messages = vec![
        (format!("{}/temperature/online", id), online.to_string()),
        (format!("{}/temperature/active", id), true.to_string()),
    ];

    if online {
        messages.push((
            format!("{}/temperature", id),
            format!("{:.2}", fahrenheit_to_celsius(record.result.mean)),
        ));
    }

    for (source, reading, _) in record.by_source() {
        messages.push((format!("{}/temperature/{}", id, source), reading.to_string()));
    }

    messages
}

/// Consumers of the live topic expect Celsius.
fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub async fn run_publish(id: String, client: AsyncClient, records: Receiver<Record>) {
    while let Ok(record) = records.recv().await {
        if let Err(e) = publish(&id, &client, &record) {
            warn!("Failed to publish record {}: {:#}", record.rectime, e);
        }
    }

    info!("Record channel closed, publish task exiting");
}

/// Queues every message without waiting on the broker. While disconnected the
/// request queue fills up and the rest of the record is dropped.
fn publish(id: &str, client: &AsyncClient, record: &Record) -> Result<()> {
    for (topic, payload) in messages(id, record) {
        client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.into_bytes())
            .map_err(|e| anyhow!("MQTT request queue rejected message: {}", e))?;
    }

    Ok(())
}
