use {
    crate::sources::{parse_temperature, Source, SourceId},
    anyhow::{anyhow, Context, Result},
    reqwest::{Client, Url},
    serde_json::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    DarkSky,
    OpenWeatherMap,
    Weather2,
    Wunderground,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::DarkSky,
        Provider::OpenWeatherMap,
        Provider::Weather2,
        Provider::Wunderground,
    ];

    pub fn source_id(&self) -> SourceId {
        match self {
            Provider::DarkSky => SourceId::DarkSky,
            Provider::OpenWeatherMap => SourceId::OpenWeatherMap,
            Provider::Weather2 => SourceId::Weather2,
            Provider::Wunderground => SourceId::Wunderground,
        }
    }

    pub fn url(&self, key: &str, latitude: &str, longitude: &str) -> Result<Url> {
        let location = format!("{},{}", latitude, longitude);

        let url = match self {
            Provider::DarkSky => Url::parse(&format!(
                "https://api.forecast.io/forecast/{}/{}",
                key, location
            ))?,
            Provider::OpenWeatherMap => Url::parse_with_params(
                "http://api.openweathermap.org/data/2.5/weather",
                &[
                    ("lat", latitude),
                    ("lon", longitude),
                    ("APPID", key),
                    ("units", "imperial"),
                ],
            )?,
            Provider::Weather2 => Url::parse_with_params(
                "http://www.myweather2.com/developer/forecast.ashx",
                &[
                    ("uac", key),
                    ("output", "json"),
                    ("query", location.as_str()),
                    ("temp_unit", "f"),
                ],
            )?,
            Provider::Wunderground => Url::parse(&format!(
                "http://api.wunderground.com/api/{}/geolookup/conditions/q/{}.json",
                key, location
            ))?,
        };

        Ok(url)
    }

    /// JSON pointer to the current temperature in the provider's response.
    pub const fn temperature_pointer(&self) -> &'static str {
        match self {
            Provider::DarkSky => "/currently/temperature",
            Provider::OpenWeatherMap => "/main/temp",
            Provider::Weather2 => "/weather/curren_weather/0/temp",
            Provider::Wunderground => "/current_observation/temp_f",
        }
    }

    pub fn extract_temperature(&self, body: &Value) -> Result<f64> {
        let pointer = self.temperature_pointer();

        match body.pointer(pointer) {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| anyhow!("{} at {} is not representable", n, pointer)),
            Some(Value::String(s)) => parse_temperature(s),
            Some(other) => Err(anyhow!("Unexpected value at {}: {}", pointer, other)),
            None => Err(anyhow!("No temperature at {}", pointer)),
        }
    }
}

pub struct ApiSource {
    provider: Provider,
    key: Option<String>,
    latitude: String,
    longitude: String,
    client: Client,
}

impl ApiSource {
    pub fn new(
        provider: Provider,
        key: Option<String>,
        latitude: String,
        longitude: String,
        client: Client,
    ) -> Self {
        Self {
            provider,
            key,
            latitude,
            longitude,
            client,
        }
    }
}

impl Source for ApiSource {
    fn id(&self) -> SourceId {
        self.provider.source_id()
    }

    async fn fetch(&mut self) -> Result<f64> {
        let key = self
            .key
            .as_deref()
            .ok_or_else(|| anyhow!("No API key configured for {}", self.id()))?;
        let url = self.provider.url(key, &self.latitude, &self.longitude)?;

        let body: Value = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("Failed to query {}", self.id()))?
            .json()
            .await
            .with_context(|| format!("Failed to decode JSON from {}", self.id()))?;

        self.provider.extract_temperature(&body)
    }
}
