use {
    crate::sources::{ds18b20::celsius_to_fahrenheit, Source, SourceId},
    aht20::Aht20,
    anyhow::{anyhow, Result},
    linux_embedded_hal::{Delay, I2cdev},
    std::sync::{Arc, Mutex},
    tokio::task,
};

const I2C_DEV: &str = "/dev/i2c-1";

pub struct Aht20Sensor {
    inner: Arc<Mutex<Aht20<I2cdev, Delay>>>,
}

impl Aht20Sensor {
    pub fn initialize() -> Result<Self> {
        let dev = I2cdev::new(I2C_DEV)?;

        let inner =
            Aht20::new(dev, Delay).map_err(|e| anyhow!("Failed to initialize AHT20: {:?}", e))?;

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }
}

impl Source for Aht20Sensor {
    fn id(&self) -> SourceId {
        SourceId::Local
    }

    async fn fetch(&mut self) -> Result<f64> {
        let celsius = blocking(&self.inner, |aht20| {
            let (_, t) = aht20
                .read()
                .map_err(|e| anyhow!("Failed to read from AHT20: {:?}", e))?;
            Ok(t.celsius())
        })
        .await?;

        Ok(celsius_to_fahrenheit(f64::from(celsius)))
    }
}

/// Runs an I2C transaction on the blocking pool; the driver sleeps between
/// the trigger and the result.
async fn blocking<T, R, F>(device: &Arc<Mutex<T>>, transaction: F) -> Result<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> Result<R> + Send + 'static,
{
    let device = Arc::clone(device);

    task::spawn_blocking(move || {
        let mut device = device
            .lock()
            .map_err(|_| anyhow!("I2C device lock poisoned"))?;
        transaction(&mut *device)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::{
            thread,
            time::{Duration, Instant},
        },
        tokio::time,
    };

    #[tokio::test]
    async fn slow_transactions_leave_the_runtime_free() {
        let device = Arc::new(Mutex::new(0u32));
        let started = Instant::now();

        let (read, ticked) = tokio::join!(
            blocking(&device, |count: &mut u32| {
                thread::sleep(Duration::from_millis(300));
                *count += 1;
                Ok(*count)
            }),
            async {
                time::sleep(Duration::from_millis(10)).await;
                started.elapsed()
            },
        );

        assert_eq!(read.unwrap(), 1);
        assert!(ticked < Duration::from_millis(300), "{:?}", ticked);
    }

    #[tokio::test]
    async fn transaction_errors_propagate() {
        let device = Arc::new(Mutex::new(()));
        let result: Result<()> = blocking(&device, |_| Err(anyhow!("NACK"))).await;

        assert_eq!(result.unwrap_err().to_string(), "NACK");
    }
}
