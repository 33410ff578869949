use std::ops::{Div, Mul};

use chrono::TimeDelta;

use crate::quantity::{power::Kilowatts, proportions::Percent};

quantity!(KilowattHours, "kWh");

impl Mul<Percent> for KilowattHours {
    type Output = Self;

    fn mul(self, percent: Percent) -> Self::Output {
        self * percent.to_proportion()
    }
}

impl Div<TimeDelta> for KilowattHours {
    type Output = Kilowatts;

    fn div(self, rhs: TimeDelta) -> Self::Output {
        Kilowatts(self.0 / (rhs.as_seconds_f64() / 3600.0))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn energy_over_time_is_power() {
        let power = KilowattHours(3.0) / TimeDelta::minutes(90);
        assert_abs_diff_eq!(power.0, 2.0);
    }

    #[test]
    fn share_of_capacity() {
        assert_abs_diff_eq!((KilowattHours(20.0) * Percent(35.0)).0, 7.0, epsilon = 1e-9);
    }
}
