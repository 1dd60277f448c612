use {
    crate::sources::{parse_temperature, Source, SourceId},
    anyhow::{anyhow, Context, Result},
    log::debug,
    std::{
        fs,
        path::{Path, PathBuf},
        time::Duration,
    },
    tokio::time,
};

pub const W1_DEVICES: &str = "/sys/bus/w1/devices";

/// 1-Wire family code of the DS18B20.
const FAMILY_PREFIX: &str = "28";
const CRC_RETRY: Duration = Duration::from_millis(200);
const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct Ds18b20 {
    device_file: PathBuf,
}

impl Ds18b20 {
    pub fn new(device_file: PathBuf) -> Self {
        Self { device_file }
    }

    pub fn discover<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();

        let mut devices = fs::read_dir(base_dir)
            .with_context(|| format!("Failed to list {}", base_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(FAMILY_PREFIX))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        devices.sort();

        let device = devices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No DS18B20 found in {}", base_dir.display()))?;
        debug!("Using DS18B20 at {}", device.display());

        Ok(Self::new(device.join("w1_slave")))
    }
}

impl Source for Ds18b20 {
    fn id(&self) -> SourceId {
        SourceId::Local
    }

    async fn fetch(&mut self) -> Result<f64> {
        for attempt in 1..=MAX_ATTEMPTS {
            let contents = tokio::fs::read_to_string(&self.device_file)
                .await
                .with_context(|| format!("Failed to read {}", self.device_file.display()))?;

            if let Some(celsius) = parse_w1_slave(&contents)? {
                return Ok(celsius_to_fahrenheit(celsius));
            }

            debug!("DS18B20 CRC check failed (attempt {})", attempt);
            time::sleep(CRC_RETRY).await;
        }

        Err(anyhow!(
            "DS18B20 CRC check failed {} times in a row",
            MAX_ATTEMPTS
        ))
    }
}

/// Parses `w1_slave` contents into degrees Celsius.
///
/// Returns `None` while the driver reports a failed CRC.
pub fn parse_w1_slave(contents: &str) -> Result<Option<f64>> {
    let mut lines = contents.lines();

    let status = lines
        .next()
        .ok_or_else(|| anyhow!("Empty w1_slave output"))?;
    if !status.trim_end().ends_with("YES") {
        return Ok(None);
    }

    let data = lines
        .next()
        .ok_or_else(|| anyhow!("Missing w1_slave data line"))?;
    let millidegrees = data
        .find("t=")
        .map(|pos| &data[pos + 2..])
        .ok_or_else(|| anyhow!("No temperature in w1_slave data: {:?}", data))?;

    Ok(Some(parse_temperature(millidegrees)? / 1000.0))
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}
