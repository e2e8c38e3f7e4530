//! One-shot hardware bring-up.
//!
//! Creates the I²C master for the expanders and configures the cycle input
//! GPIO with an any-edge interrupt routed to [`CycleSensor::on_edge`].
//! Called once from `main()` before the first transmission.

use std::sync::Arc;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::app::ports::InputLine;
use crate::pins;
use crate::sensors::cycle::CycleSensor;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    I2cInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::I2cInitFailed(rc) => write!(f, "I2C master init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR install failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

// ── I²C master ────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn init_i2c(
    i2c: esp_idf_hal::i2c::I2C0,
    baudrate_hz: u32,
) -> Result<esp_idf_hal::i2c::I2cDriver<'static>, HwInitError> {
    use esp_idf_hal::gpio::AnyIOPin;
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::units::Hertz;

    // SAFETY: the SDA/SCL pins are reserved for this bus in `pins` and are
    // not handed to any other driver.
    let (sda, scl) = unsafe {
        (
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
        )
    };
    let config = I2cConfig::new().baudrate(Hertz(baudrate_hz));
    let driver = I2cDriver::new(i2c, sda, scl, &config)
        .map_err(|e| HwInitError::I2cInitFailed(e.code()))?;
    info!(
        "hw_init: I2C0 up (SDA={}, SCL={}, {} Hz)",
        pins::I2C_SDA_GPIO,
        pins::I2C_SCL_GPIO,
        baudrate_hz
    );
    Ok(driver)
}

// ── Cycle input + edge ISR ────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn cycle_gpio_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the pointer leaked from an `Arc<CycleSensor>` in
    // `init_cycle_input`; it is never released, so it outlives the ISR.
    let sensor = unsafe { &*(arg as *const CycleSensor) };
    sensor.on_edge();
}

/// Configure the cycle input and attach `sensor` to its edge interrupt.
///
/// The ISR keeps its own strong reference to the sensor for the life of
/// the program.
#[cfg(target_os = "espidf")]
pub fn init_cycle_input(sensor: &Arc<CycleSensor>) -> Result<(), HwInitError> {
    let pin = pins::CYCLE_INPUT_GPIO;
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
    };

    // SAFETY: called once from main before any transmission; the handler
    // only touches the sensor's atomics and signal.
    unsafe {
        let ret = gpio_config(&cfg);
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }

        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        let ctx = Arc::into_raw(Arc::clone(sensor)) as *mut core::ffi::c_void;
        let ret = gpio_isr_handler_add(pin, Some(cycle_gpio_isr), ctx);
        if ret != ESP_OK as i32 {
            drop(Arc::from_raw(ctx as *const CycleSensor));
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_intr_enable(pin);
    }

    info!("hw_init: cycle input on GPIO{} (any edge)", pin);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_cycle_input(_sensor: &Arc<CycleSensor>) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): cycle input ISR skipped");
    Ok(())
}

/// Level reader for the cycle input GPIO.
pub struct GpioInputLine {
    pin: i32,
}

impl GpioInputLine {
    pub fn new() -> Self {
        Self {
            pin: pins::CYCLE_INPUT_GPIO,
        }
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }
}

impl Default for GpioInputLine {
    fn default() -> Self {
        Self::new()
    }
}

impl InputLine for GpioInputLine {
    #[cfg(target_os = "espidf")]
    fn read_input_line(&self) -> bool {
        // SAFETY: read-only register access on a configured input pin.
        (unsafe { gpio_get_level(self.pin) }) != 0
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_input_line(&self) -> bool {
        false
    }
}
