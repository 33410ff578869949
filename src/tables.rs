use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::core::{
    cache::Freshness,
    controller::Transition,
    inverter::{InverterMode, RegisterMap},
    status::{Actuation, DemandOrigin, StatusSnapshot},
};

pub fn build_status_table(snapshot: &StatusSnapshot) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table.set_header(vec!["", "Value", "Details"]);

    let window = &snapshot.window;
    table.add_row(vec![
        Cell::new("Window").add_attribute(Attribute::Bold),
        Cell::new(format!("{} – {}", window.start.format("%b %d %H:%M"), window.end.format("%H:%M"))),
        if window.is_active {
            Cell::new("active").fg(Color::Green)
        } else {
            Cell::new("upcoming").add_attribute(Attribute::Dim)
        },
    ]);

    if let Some(battery) = &snapshot.battery {
        table.add_row(vec![
            Cell::new("Battery").add_attribute(Attribute::Bold),
            Cell::new(format!("{:.0}", battery.soc_percent)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0}", battery.rate_w)).fg(if battery.is_charging {
                Color::Green
            } else {
                Color::DarkYellow
            }),
        ]);
    }

    if let Some(forecast) = &snapshot.forecast {
        table.add_row(vec![
            Cell::new("Solar").add_attribute(Attribute::Bold),
            Cell::new(format!("{:.1}", forecast.solar_kwh)).set_alignment(CellAlignment::Right),
            freshness_cell(forecast.solar_freshness),
        ]);
        table.add_row(vec![
            Cell::new("Demand").add_attribute(Attribute::Bold),
            Cell::new(format!("{:.1}", forecast.demand_kwh)).set_alignment(CellAlignment::Right),
            match forecast.demand_origin {
                DemandOrigin::Forecast(freshness) => freshness_cell(freshness),
                DemandOrigin::Fallback => Cell::new("fallback").fg(Color::Red),
            },
        ]);
    }

    if let Some(decision) = &snapshot.decision {
        table.add_row(vec![
            Cell::new("Deficit").add_attribute(Attribute::Bold),
            Cell::new(format!("{:.1}", decision.deficit_kwh)).set_alignment(CellAlignment::Right),
            Cell::new(format!("sunset shortfall {:.1}", decision.sunset_shortfall_kwh))
                .add_attribute(Attribute::Dim),
        ]);
        table.add_row(vec![
            Cell::new("Decision").add_attribute(Attribute::Bold),
            Cell::new(format!("{:.0}", decision.required_rate_w)).set_alignment(CellAlignment::Right),
            if decision.should_charge {
                Cell::new("charge overnight").fg(Color::Red)
            } else {
                Cell::new("no charge needed").fg(Color::Green)
            },
        ]);
    }

    if let Some(inverter) = &snapshot.inverter {
        table.add_row(vec![
            Cell::new("Inverter").add_attribute(Attribute::Bold),
            Cell::new(format!("{:.0}", inverter.commanded_rate_w)).set_alignment(CellAlignment::Right),
            match inverter.mode {
                InverterMode::Normal => Cell::new("normal").fg(Color::Green),
                InverterMode::ForceCharge => Cell::new("force charge").fg(Color::DarkYellow),
            },
        ]);
    }

    table.add_row(vec![
        Cell::new("Actuation").add_attribute(Attribute::Bold),
        Cell::new(""),
        actuation_cell(&snapshot.actuation),
    ]);

    for error in &snapshot.errors {
        table.add_row(vec![
            Cell::new("Error").add_attribute(Attribute::Bold).fg(Color::Red),
            Cell::new(""),
            Cell::new(error).fg(Color::Red),
        ]);
    }
    table
}

pub fn build_registers_table(registers: &RegisterMap, mode: u16, rate: u16) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table.set_header(vec!["Register", "Address", "Raw", "Value"]);
    table.add_row(vec![
        Cell::new("Mode").add_attribute(Attribute::Bold),
        Cell::new(registers.mode).add_attribute(Attribute::Dim),
        Cell::new(mode).set_alignment(CellAlignment::Right),
        match registers.decode_mode(mode) {
            Some(InverterMode::Normal) => Cell::new("normal").fg(Color::Green),
            Some(InverterMode::ForceCharge) => Cell::new("force charge").fg(Color::DarkYellow),
            None => Cell::new("unknown").fg(Color::Red),
        },
    ]);
    table.add_row(vec![
        Cell::new("Rate").add_attribute(Attribute::Bold),
        Cell::new(registers.rate).add_attribute(Attribute::Dim),
        Cell::new(rate).set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.0}", registers.decode_rate(rate))).set_alignment(CellAlignment::Right),
    ]);
    table
}

fn freshness_cell(freshness: Freshness) -> Cell {
    match freshness {
        Freshness::Fresh => Cell::new("fresh").fg(Color::Green),
        Freshness::Cached => Cell::new("cached").add_attribute(Attribute::Dim),
        Freshness::Stale => Cell::new("stale").fg(Color::DarkYellow),
    }
}

fn actuation_cell(actuation: &Actuation) -> Cell {
    match actuation {
        Actuation::Skipped => Cell::new("scouting").add_attribute(Attribute::Dim),
        Actuation::Held => Cell::new("held").fg(Color::DarkYellow),
        Actuation::Applied { transition } => match transition {
            Transition::None => Cell::new("unchanged").add_attribute(Attribute::Dim),
            Transition::StartCharging { rate } => {
                Cell::new(format!("started charging at {rate:.0}")).fg(Color::Green)
            }
            Transition::AdjustRate { from, to } => {
                Cell::new(format!("adjusted {from:.0} → {to:.0}")).fg(Color::Green)
            }
            Transition::StopCharging => Cell::new("stopped charging").fg(Color::Green),
        },
        Actuation::Failed { error } => Cell::new(error).fg(Color::Red),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;
    use crate::{
        core::{
            inverter::fake::fronius_registers,
            status::{DecisionStatus, WindowStatus},
        },
        prelude::*,
        quantity::{energy::KilowattHours, power::Watts},
    };

    #[test]
    fn status_table_ok() -> Result {
        let start = Local.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap();
        let snapshot = StatusSnapshot {
            timestamp: start,
            window: WindowStatus { start, end: start + chrono::TimeDelta::hours(6), is_active: true },
            forecast: None,
            battery: None,
            decision: Some(DecisionStatus {
                deficit_kwh: KilowattHours(18.3),
                sunset_shortfall_kwh: KilowattHours::ZERO,
                should_charge: true,
                required_rate_w: Watts(3852.6),
            }),
            inverter: None,
            actuation: Actuation::Applied {
                transition: Transition::StartCharging { rate: Watts(3852.6) },
            },
            errors: vec!["battery sensors are unavailable".to_string()],
        };
        let rendered = build_status_table(&snapshot).to_string();
        assert!(rendered.contains("18.3 kWh"));
        assert!(rendered.contains("3853 W"));
        assert!(rendered.contains("charge overnight"));
        assert!(rendered.contains("battery sensors are unavailable"));
        Ok(())
    }

    #[test]
    fn registers_table_ok() {
        let rendered = build_registers_table(&fronius_registers(), 2, 65336).to_string();
        assert!(rendered.contains("force charge"));
        assert!(rendered.contains("2000 W"));
    }
}
