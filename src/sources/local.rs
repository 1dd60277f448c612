use {
    crate::{
        config::LocalSensorKind,
        sources::{parse_temperature, Aht20Sensor, Ds18b20, Source, SourceId},
    },
    anyhow::{anyhow, Context, Result},
    log::{info, warn},
    reqwest::{Client, Url},
};

pub enum LocalSensor {
    Ds18b20(Ds18b20),
    Aht20(Aht20Sensor),
    /// Plain-text Fahrenheit value served over HTTP by the sensor host.
    Remote { url: Url, client: Client },
    Absent(String),
}

impl LocalSensor {
    pub fn initialize(kind: &LocalSensorKind, client: Client) -> Self {
        let sensor = match kind {
            LocalSensorKind::Ds18b20 => {
                Ds18b20::discover(super::ds18b20::W1_DEVICES).map(LocalSensor::Ds18b20)
            }
            LocalSensorKind::Aht20 => Aht20Sensor::initialize().map(LocalSensor::Aht20),
            LocalSensorKind::Remote(url) => Ok(LocalSensor::Remote {
                url: url.clone(),
                client,
            }),
        };

        match sensor {
            Ok(sensor) => {
                info!("Started local sensor ({})", kind);
                sensor
            }
            Err(e) => {
                warn!("{:#}", e);
                LocalSensor::Absent(format!("{:#}", e))
            }
        }
    }
}

impl Source for LocalSensor {
    fn id(&self) -> SourceId {
        SourceId::Local
    }

    async fn fetch(&mut self) -> Result<f64> {
        match self {
            LocalSensor::Ds18b20(sensor) => sensor.fetch().await,
            LocalSensor::Aht20(sensor) => sensor.fetch().await,
            LocalSensor::Remote { url, client } => {
                let body = client
                    .get(url.clone())
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .with_context(|| format!("Failed to query {}", url))?
                    .text()
                    .await
                    .with_context(|| format!("Failed to read body from {}", url))?;

                parse_temperature(&body)
            }
            LocalSensor::Absent(reason) => Err(anyhow!("Local sensor not initialized: {}", reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_sensor_always_fails() {
        let mut sensor = LocalSensor::Absent("No DS18B20 found".to_string());
        assert!(sensor.fetch().await.is_err());
        assert_eq!(sensor.id(), SourceId::Local);
    }

    #[test]
    fn remote_sensor_needs_no_hardware() {
        let url = Url::parse("http://raspberrypi.local/temp.txt").unwrap();
        let sensor = LocalSensor::initialize(&LocalSensorKind::Remote(url.clone()), Client::new());

        match sensor {
            LocalSensor::Remote { url: actual, .. } => assert_eq!(actual, url),
            _ => panic!("expected a remote sensor"),
        }
    }
}
