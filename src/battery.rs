//! Battery voltage sampling.

use thiserror_no_std::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BatteryError {
    #[error("ADC conversion failed")]
    Conversion,
}

/// Single-channel ADC wired to the battery divider.
pub trait BatteryAdc {
    fn read_raw(&mut self) -> Result<u16, BatteryError>;
}

/// Raw ADC count to millivolts conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatteryScale {
    /// Resistor divider ratio in front of the ADC pin
    pub divider_ratio: u32,
    /// ADC reference voltage in millivolts
    pub reference_mv: u32,
    /// Number of ADC codes (4096 for 12 bits)
    pub adc_full_scale: u32,
}

impl BatteryScale {
    pub const fn millivolts(&self, raw: u16) -> u32 {
        if self.adc_full_scale == 0 {
            return 0;
        }
        (raw as u32 * self.divider_ratio * self.reference_mv) / self.adc_full_scale
    }
}

/// Battery monitor: an ADC channel plus its scale.
pub struct Battery<A> {
    adc: A,
    scale: BatteryScale,
}

impl<A: BatteryAdc> Battery<A> {
    pub fn new(adc: A, scale: BatteryScale) -> Self {
        Self { adc, scale }
    }

    /// Sample the battery in millivolts.
    ///
    /// A failed conversion reads as 0 mV so the report still goes out.
    pub fn sample(&mut self) -> u32 {
        match self.adc.read_raw() {
            Ok(raw) => {
                let mv = self.scale.millivolts(raw);
                log::info!("battery: {} mV (raw={})", mv, raw);
                mv
            }
            Err(e) => {
                log::warn!("battery: {}", e);
                0
            }
        }
    }
}
