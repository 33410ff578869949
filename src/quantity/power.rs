use std::ops::Mul;

use chrono::TimeDelta;

use crate::quantity::energy::KilowattHours;

quantity!(Watts, "W");
quantity!(Kilowatts, "kW");

impl From<Kilowatts> for Watts {
    fn from(kilowatts: Kilowatts) -> Self {
        Self(kilowatts.0 * 1000.0)
    }
}

impl From<Watts> for Kilowatts {
    fn from(watts: Watts) -> Self {
        Self(watts.0 / 1000.0)
    }
}

impl Mul<TimeDelta> for Kilowatts {
    type Output = KilowattHours;

    fn mul(self, rhs: TimeDelta) -> Self::Output {
        KilowattHours(self.0 * rhs.as_seconds_f64() / 3600.0)
    }
}

impl Mul<TimeDelta> for Watts {
    type Output = KilowattHours;

    fn mul(self, rhs: TimeDelta) -> Self::Output {
        Kilowatts::from(self) * rhs
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn watts_over_half_an_hour() {
        let energy = Watts(1500.0) * TimeDelta::minutes(30);
        assert_abs_diff_eq!(energy.0, 0.75);
    }

    #[test]
    fn kilowatts_to_watts() {
        assert_abs_diff_eq!(Watts::from(Kilowatts(1.25)).0, 1250.0);
    }
}
