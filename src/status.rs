//! Status publishing.

use std::path::PathBuf;

use crate::{core::status::StatusSnapshot, db::write_atomically, prelude::*, tables::build_status_table};

pub trait StatusSink {
    fn publish(&self, snapshot: &StatusSnapshot) -> Result;
}

/// Logs the summary as a structured event.
pub struct LogSink;

impl StatusSink for LogSink {
    fn publish(&self, snapshot: &StatusSnapshot) -> Result {
        info!(
            window_active = snapshot.window.is_active,
            solar = ?snapshot.forecast.map(|forecast| forecast.solar_kwh),
            demand = ?snapshot.forecast.map(|forecast| forecast.demand_kwh),
            should_charge = ?snapshot.decision.map(|decision| decision.should_charge),
            required_rate = ?snapshot.decision.map(|decision| decision.required_rate_w),
            actuation = ?snapshot.actuation,
            n_errors = snapshot.errors.len(),
            "status",
        );
        Ok(())
    }
}

/// Prints the human-readable table to the standard output.
pub struct TableSink;

impl StatusSink for TableSink {
    fn publish(&self, snapshot: &StatusSnapshot) -> Result {
        println!("{}", build_status_table(snapshot));
        Ok(())
    }
}

/// Replaces the JSON file on every publication.
pub struct JsonFileSink(pub PathBuf);

impl StatusSink for JsonFileSink {
    #[instrument(skip_all, fields(path = %self.0.display()))]
    fn publish(&self, snapshot: &StatusSnapshot) -> Result {
        write_atomically(&self.0, &serde_json::to_vec_pretty(snapshot)?)?;
        debug!("written");
        Ok(())
    }
}

/// Fans the snapshot out, a failing sink never affects the others.
#[must_use]
#[derive(Default)]
pub struct StatusPublisher(Vec<Box<dyn StatusSink>>);

impl StatusPublisher {
    pub fn with(mut self, sink: impl StatusSink + 'static) -> Self {
        self.0.push(Box::new(sink));
        self
    }

    pub fn publish(&self, snapshot: &StatusSnapshot) {
        for sink in &self.0 {
            if let Err(error) = sink.publish(snapshot) {
                warn!("failed to publish the status: {error:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, fs, rc::Rc};

    use chrono::{Local, TimeZone};

    use super::*;
    use crate::core::status::{Actuation, WindowStatus};

    fn snapshot() -> StatusSnapshot {
        let start = Local.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap();
        StatusSnapshot {
            timestamp: start,
            window: WindowStatus { start, end: start + chrono::TimeDelta::hours(6), is_active: true },
            forecast: None,
            battery: None,
            decision: None,
            inverter: None,
            actuation: Actuation::Held,
            errors: vec!["weather service is down".to_string()],
        }
    }

    struct FailingSink;

    impl StatusSink for FailingSink {
        fn publish(&self, _snapshot: &StatusSnapshot) -> Result {
            bail!("disk is full")
        }
    }

    struct CountingSink(Rc<Cell<usize>>);

    impl StatusSink for CountingSink {
        fn publish(&self, _snapshot: &StatusSnapshot) -> Result {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn json_file_ok() -> Result {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("status.json");
        JsonFileSink(path.clone()).publish(&snapshot())?;
        let json: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
        assert_eq!(json["actuation"]["status"], "held");
        assert_eq!(json["window"]["is_active"], true);
        assert_eq!(json["errors"][0], "weather service is down");
        assert!(json["decision"].is_null());
        Ok(())
    }

    #[test]
    fn failing_sink_does_not_stop_others() {
        let n_published = Rc::new(Cell::new(0));
        StatusPublisher::default()
            .with(FailingSink)
            .with(CountingSink(Rc::clone(&n_published)))
            .publish(&snapshot());
        assert_eq!(n_published.get(), 1);
    }
}
