use {
    crate::sources::Provider,
    anyhow::{anyhow, Context, Result},
    reqwest::Url,
    std::{env, fmt, time::Duration},
};

pub const DEFAULT_DB_NAME: &str = "temperatures";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalSensorKind {
    Ds18b20,
    Aht20,
    Remote(Url),
}

impl LocalSensorKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "ds18b20" => Ok(LocalSensorKind::Ds18b20),
            "aht20" => Ok(LocalSensorKind::Aht20),
            url if url.starts_with("http://") || url.starts_with("https://") => Url::parse(url)
                .map(LocalSensorKind::Remote)
                .with_context(|| format!("Invalid local sensor URL {:?}", url)),
            other => Err(anyhow!(
                "Unknown LOCAL_SENSOR {:?}, expected ds18b20, aht20 or a URL",
                other
            )),
        }
    }
}

impl fmt::Display for LocalSensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalSensorKind::Ds18b20 => f.write_str("ds18b20"),
            LocalSensorKind::Aht20 => f.write_str("aht20"),
            LocalSensorKind::Remote(url) => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub id: String,
    pub latitude: String,
    pub longitude: String,
    pub darksky_key: Option<String>,
    pub owm_key: Option<String>,
    pub w2_key: Option<String>,
    pub wg_key: Option<String>,
    pub local_sensor: LocalSensorKind,
    pub db_address: String,
    pub db_port: u16,
    pub db_name: String,
    pub mqtt: Option<MqttConfig>,
    pub interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source; empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| anyhow!("Failed to find {} environment variable", key))
        };
        let port = |key: &str, value: String| {
            value
                .parse::<u16>()
                .with_context(|| format!("Invalid {} {:?}", key, value))
        };

        let id = get("DEVICE_ID")
            .or_else(|| get("BALENA_DEVICE_UUID"))
            .ok_or_else(|| anyhow!("Failed to find DEVICE_ID or BALENA_DEVICE_UUID environment variable"))?;

        let local_sensor = match get("LOCAL_SENSOR") {
            Some(value) => LocalSensorKind::parse(&value)?,
            None => LocalSensorKind::Ds18b20,
        };

        let mqtt = match get("MQTT_ADDR") {
            Some(address) => Some(MqttConfig {
                address,
                port: match get("MQTT_PORT") {
                    Some(value) => port("MQTT_PORT", value)?,
                    None => DEFAULT_MQTT_PORT,
                },
            }),
            None => None,
        };

        let interval = match get("POLL_INTERVAL_SECS") {
            Some(value) => {
                let secs = value
                    .parse::<u64>()
                    .with_context(|| format!("Invalid POLL_INTERVAL_SECS {:?}", value))?;
                if secs == 0 {
                    return Err(anyhow!("POLL_INTERVAL_SECS must be greater than zero"));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_INTERVAL,
        };

        Ok(Config {
            id,
            latitude: require("LATITUDE")?,
            longitude: require("LONGITUDE")?,
            darksky_key: get("DARKSKY_KEY"),
            owm_key: get("OWM_KEY"),
            w2_key: get("W2_KEY"),
            wg_key: get("WG_KEY"),
            local_sensor,
            db_address: require("DB_ADDR")?,
            db_port: port("DB_PORT", require("DB_PORT")?)?,
            db_name: get("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            mqtt,
            interval,
        })
    }

    pub fn api_key(&self, provider: Provider) -> Option<String> {
        match provider {
            Provider::DarkSky => self.darksky_key.clone(),
            Provider::OpenWeatherMap => self.owm_key.clone(),
            Provider::Weather2 => self.w2_key.clone(),
            Provider::Wunderground => self.wg_key.clone(),
        }
    }

    pub fn db_url(&self) -> String {
        format!("http://{}:{}", self.db_address, self.db_port)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("BALENA_DEVICE_UUID", "abc123"),
        ("LATITUDE", "42.36"),
        ("LONGITUDE", "-71.06"),
        ("DB_ADDR", "influxdb"),
        ("DB_PORT", "8086"),
    ];

    #[test]
    fn defaults() {
        let config = config(MINIMAL).unwrap();

        assert_eq!(config.id, "abc123");
        assert_eq!(config.local_sensor, LocalSensorKind::Ds18b20);
        assert_eq!(config.db_name, DEFAULT_DB_NAME);
        assert_eq!(config.db_url(), "http://influxdb:8086");
        assert_eq!(config.mqtt, None);
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.api_key(Provider::DarkSky), None);
    }

    #[test]
    fn overrides() {
        let mut vars = MINIMAL.to_vec();
        vars.extend_from_slice(&[
            ("DEVICE_ID", "porch"),
            ("OWM_KEY", "owm-secret"),
            ("WG_KEY", "  "),
            ("LOCAL_SENSOR", "http://raspberrypi.local/temp.txt"),
            ("DB_NAME", "fahrensight"),
            ("MQTT_ADDR", "mosquitto"),
            ("MQTT_PORT", "8883"),
            ("POLL_INTERVAL_SECS", "60"),
        ]);
        let config = config(&vars).unwrap();

        assert_eq!(config.id, "porch");
        assert_eq!(
            config.api_key(Provider::OpenWeatherMap).as_deref(),
            Some("owm-secret")
        );
        assert_eq!(config.api_key(Provider::Wunderground), None);
        assert_eq!(
            config.local_sensor.to_string(),
            "http://raspberrypi.local/temp.txt"
        );
        assert_eq!(config.db_name, "fahrensight");
        assert_eq!(
            config.mqtt,
            Some(MqttConfig {
                address: "mosquitto".to_string(),
                port: 8883
            })
        );
        assert_eq!(config.interval, Duration::from_secs(60));
    }

    #[test]
    fn missing_required_values() {
        for skip in ["BALENA_DEVICE_UUID", "LATITUDE", "LONGITUDE", "DB_ADDR", "DB_PORT"] {
            let vars: Vec<_> = MINIMAL.iter().filter(|(k, _)| *k != skip).cloned().collect();
            let err = config(&vars).unwrap_err();
            assert!(err.to_string().contains(skip), "{}", err);
        }
    }

    #[test]
    fn invalid_values() {
        for bad in [
            ("DB_PORT", "eighty"),
            ("MQTT_PORT", "70000"),
            ("LOCAL_SENSOR", "thermistor"),
            ("POLL_INTERVAL_SECS", "0"),
            ("POLL_INTERVAL_SECS", "-5"),
        ] {
            let mut vars: Vec<_> = MINIMAL.iter().filter(|(k, _)| *k != bad.0).cloned().collect();
            vars.push(("MQTT_ADDR", "mosquitto"));
            vars.push(bad);
            assert!(config(&vars).is_err(), "{:?} accepted", bad);
        }
    }

    #[test]
    fn local_sensor_kinds() {
        assert_eq!(
            LocalSensorKind::parse("aht20").unwrap(),
            LocalSensorKind::Aht20
        );
        assert_eq!(
            LocalSensorKind::parse(" ds18b20 ").unwrap(),
            LocalSensorKind::Ds18b20
        );
        assert!(LocalSensorKind::parse("http://").is_err());
    }
}
