use {
    crate::{
        aggregate::{aggregate, AggregateResult, Reading},
        sources::{SourceId, SOURCES},
    },
    chrono::{DateTime, Local, Utc},
    influxdb::InfluxDbWriteable,
    std::fmt,
};

/// Format of the `rectime` column, in local time.
pub const RECTIME_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub rectime: String,
    pub readings: [Reading; SOURCES],
    pub result: AggregateResult<SOURCES>,
}

impl Record {
    pub fn new(time: DateTime<Utc>, readings: [Reading; SOURCES]) -> Self {
        Self {
            time,
            rectime: time.with_timezone(&Local).format(RECTIME_FORMAT).to_string(),
            readings,
            result: aggregate(&readings),
        }
    }

    pub fn valid_sources(&self) -> usize {
        self.readings.iter().filter(|r| r.is_valid()).count()
    }

    pub fn by_source(&self) -> impl Iterator<Item = (SourceId, Reading, Reading)> + '_ {
        SourceId::ALL
            .iter()
            .zip(self.readings.iter().zip(self.result.deltas.iter()))
            .map(|(id, (reading, delta))| (*id, *reading, *delta))
    }

    /// Flattens the record into stored columns, writing the sentinel for
    /// every unavailable reading or delta.
    pub fn to_row(&self, id: &str) -> TemperatureRow {
        let [dsapi_read, owm_read, w2_read, wg_read, ds18b20_read] =
            self.readings.map(Reading::to_raw);
        let [dsapi_delta, owm_delta, w2_delta, wg_delta, ds18b20_delta] =
            self.result.deltas.map(Reading::to_raw);

        TemperatureRow {
            time: self.time,
            rectime: self.rectime.clone(),
            dsapi_read,
            owm_read,
            w2_read,
            wg_read,
            ds18b20_read,
            temps_mean: self.result.mean,
            dsapi_delta,
            owm_delta,
            w2_delta,
            wg_delta,
            ds18b20_delta,
            id: id.to_string(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mean={:.2}", self.rectime, self.result.mean)?;
        for (source, reading, delta) in self.by_source() {
            write!(f, " {}={}({})", source, reading, delta)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, InfluxDbWriteable)]
pub struct TemperatureRow {
    pub time: DateTime<Utc>,
    pub rectime: String,
    pub dsapi_read: f64,
    pub owm_read: f64,
    pub w2_read: f64,
    pub wg_read: f64,
    pub ds18b20_read: f64,
    pub temps_mean: f64,
    pub dsapi_delta: f64,
    pub owm_delta: f64,
    pub w2_delta: f64,
    pub wg_delta: f64,
    pub ds18b20_delta: f64,
    #[influxdb(tag)]
    pub id: String,
}
