//! embassy-time driver symbols.
//!
//! `async_io_mini::Timer` is built on embassy-time, which links against
//! `_embassy_time_now` and `_embassy_time_schedule_wake` provided by the
//! application. Ticks are microseconds (embassy-time's default 1 MHz rate).
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()`.
//! - **`not(target_os = "espidf")`**: a process-wide `Instant` origin, so
//!   host tests and fuzz builds link and run the same session code.
//!
//! Wakeups are served by a short-lived sleeper thread per registration.
//! Sessions register one deadline at a time, so this stays cheap.

use core::ffi::c_void;
use core::task::Waker;
use core::time::Duration;

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _embassy_time_now() -> u64 {
    // SAFETY: reads the free-running system timer; no shared state.
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
}

#[cfg(not(target_os = "espidf"))]
#[unsafe(no_mangle)]
pub extern "C" fn _embassy_time_now() -> u64 {
    static ORIGIN: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    ORIGIN.get_or_init(std::time::Instant::now).elapsed().as_micros() as u64
}

/// Wake `waker` once `_embassy_time_now()` reaches `at`.
#[unsafe(no_mangle)]
pub extern "C" fn _embassy_time_schedule_wake(at: u64, waker: *mut c_void) {
    if waker.is_null() {
        return;
    }

    // SAFETY: embassy-time passes a valid `&Waker` for the duration of the
    // call; it is cloned before the call returns.
    let waker = unsafe { (*(waker as *const Waker)).clone() };
    std::thread::spawn(move || {
        let now = _embassy_time_now();
        if at > now {
            std::thread::sleep(Duration::from_micros(at - now));
        }
        waker.wake();
    });
}
