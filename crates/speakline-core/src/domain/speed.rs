//! Conversion from user-facing speech rates to engine speed scales.

/// Rate (words per minute) that maps to a speed scale of `1.0`.
pub const BASE_RATE_WPM: u32 = 200;

/// Slowest speed scale the engine accepts.
pub const MIN_SPEED: f32 = 0.5;

/// Fastest speed scale the engine accepts.
pub const MAX_SPEED: f32 = 2.0;

/// Convert a words-per-minute rate into an engine speed scale.
#[allow(clippy::cast_precision_loss)]
pub fn rate_to_speed(rate_wpm: u32) -> f32 {
    (rate_wpm as f32 / BASE_RATE_WPM as f32).clamp(MIN_SPEED, MAX_SPEED)
}

/// Pick the speed scale for a request.
///
/// An explicit `factor` wins and is used as given. Otherwise `rate` (or the
/// configured default rate) is converted with [`rate_to_speed`].
pub fn resolve_speed(factor: Option<f32>, rate: Option<u32>, default_rate: u32) -> f32 {
    match factor {
        Some(factor) if factor.is_finite() && factor > 0.0 => factor,
        _ => rate_to_speed(rate.unwrap_or(default_rate)),
    }
}
