use {
    crate::aggregate::Reading,
    anyhow::Result,
    log::{debug, warn},
    std::{fmt, future::Future},
};

mod aht20;
mod api;
mod ds18b20;
mod local;

pub use {
    self::aht20::Aht20Sensor,
    api::{ApiSource, Provider},
    ds18b20::Ds18b20,
    local::LocalSensor,
};

pub const SOURCES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceId {
    DarkSky,
    OpenWeatherMap,
    Weather2,
    Wunderground,
    Local,
}

impl SourceId {
    pub const ALL: [SourceId; SOURCES] = [
        SourceId::DarkSky,
        SourceId::OpenWeatherMap,
        SourceId::Weather2,
        SourceId::Wunderground,
        SourceId::Local,
    ];

    pub const fn column(&self) -> &'static str {
        match self {
            SourceId::DarkSky => "dsapi",
            SourceId::OpenWeatherMap => "owm",
            SourceId::Weather2 => "w2",
            SourceId::Wunderground => "wg",
            SourceId::Local => "ds18b20",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

pub trait Source {
    fn id(&self) -> SourceId;

    fn fetch(&mut self) -> impl Future<Output = Result<f64>>;
}

/// Reads `source` once, folding every kind of failure into `Unavailable`.
pub async fn acquire<S: Source>(source: &mut S) -> Reading {
    let id = source.id();

    match source.fetch().await {
        Ok(value) if value.is_finite() => {
            debug!("{} read {:.2}", id, value);
            Reading::from_raw(value)
        }
        Ok(value) => {
            warn!("{} returned non-finite value {}", id, value);
            Reading::Unavailable
        }
        Err(e) => {
            warn!("{} unavailable: {:#}", id, e);
            Reading::Unavailable
        }
    }
}

/// Parses a temperature the way the providers send it: bare or quoted, with
/// surrounding whitespace.
pub fn parse_temperature(raw: &str) -> Result<f64> {
    let trimmed = raw.trim().trim_matches('"').trim();
    trimmed
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("Failed to parse temperature {:?}: {}", trimmed, e))
}
