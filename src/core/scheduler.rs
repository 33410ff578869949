use chrono::{DateTime, Local};

use crate::{
    core::{config::SystemConfig, deficit::DeficitDecision},
    ops::Interval,
    prelude::*,
    quantity::power::Watts,
};

/// Constant charge rate that closes the required energy by the window end.
#[instrument(skip_all, fields(now = %now, window = ?window))]
pub fn schedule(
    decision: &DeficitDecision,
    now: DateTime<Local>,
    window: Interval,
    config: &SystemConfig,
) -> Watts {
    if !decision.should_charge_overnight {
        return Watts::ZERO;
    }
    if now >= window.end {
        warn!("the window has ended, charging at the maximum rate");
        return config.max_charge_rate;
    }
    let remaining = Interval { start: now.max(window.start), ..window }.len();
    let energy = decision.required_energy() / config.charge_efficiency;
    let rate = Watts::from(energy / remaining).clamp(Watts::ZERO, config.max_charge_rate);
    info!(rate = ?rate, remaining = ?remaining, "scheduled");
    rate
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::quantity::energy::KilowattHours;

    fn decision(deficit: f64) -> DeficitDecision {
        DeficitDecision {
            deficit: KilowattHours(deficit),
            sunset_shortfall: KilowattHours::ZERO,
            should_charge_overnight: deficit > 0.0,
            required_charge_rate: Watts::ZERO,
        }
    }

    fn window() -> Interval {
        Interval {
            start: Local.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap(),
            end: Local.with_ymd_and_hms(2025, 6, 11, 6, 0, 0).unwrap(),
        }
    }

    #[test]
    fn spreads_deficit_over_remaining_window() {
        let rate = schedule(&decision(5.5), window().start, window(), &SystemConfig::sample());
        assert_abs_diff_eq!(rate.0, 964.912, epsilon = 1e-3);
    }

    #[test]
    fn before_window_uses_full_length() {
        let now = window().start - TimeDelta::hours(3);
        let rate = schedule(&decision(5.5), now, window(), &SystemConfig::sample());
        assert_abs_diff_eq!(rate.0, 964.912, epsilon = 1e-3);
    }

    #[test]
    fn at_window_end_returns_maximum() {
        let rate = schedule(&decision(0.1), window().end, window(), &SystemConfig::sample());
        assert_eq!(rate, Watts(5000.0));
    }

    #[test]
    fn no_charge_returns_zero() {
        let rate = schedule(&decision(0.0), window().start, window(), &SystemConfig::sample());
        assert_eq!(rate, Watts::ZERO);
    }

    #[test]
    fn never_exceeds_maximum() {
        let config = SystemConfig::sample();
        for deficit in [0.5, 5.0, 29.0, 30.0, 100.0] {
            for minutes in [0, 30, 180, 355, 359] {
                let now = window().start + TimeDelta::minutes(minutes);
                let rate = schedule(&decision(deficit), now, window(), &config);
                assert!(rate <= config.max_charge_rate, "{deficit} kWh at +{minutes}m: {rate}");
                assert!(rate >= Watts::ZERO);
            }
        }
    }
}
