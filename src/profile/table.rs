use crate::system::config::Configuration;
use crate::types::Waypoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

/// One row of the profile point table, in display units.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// 1-based row number.
    pub number: usize,
    pub time: f64,
    pub temperature: f64,
    /// Absolute slope in degrees per slope unit; `None` when two points share a time.
    pub slope: Option<f64>,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableColumn {
    Time,
    Temperature,
}

pub fn profile_table(points: &[Waypoint], config: &Configuration) -> Vec<TableRow> {
    let mut rows = Vec::with_capacity(points.len());
    let mut previous: Option<&Waypoint> = None;

    for (index, point) in points.iter().enumerate() {
        let per_second = previous.and_then(|prev| {
            let dt = point.time_s - prev.time_s;
            (dt != 0.0).then(|| (point.temperature - prev.temperature) / dt)
        });

        let trend = match per_second {
            Some(s) if s > 0.0 => Trend::Up,
            Some(s) if s < 0.0 => Trend::Down,
            _ => Trend::Flat,
        };

        rows.push(TableRow {
            number: index + 1,
            time: config.time_scale_profile.from_seconds(point.time_s),
            temperature: point.temperature,
            slope: per_second.map(|s| config.format_slope(s.abs())),
            trend,
        });
        previous = Some(point);
    }

    rows
}

/// Point after editing one table cell. Time cells are in display units.
pub fn apply_cell_edit(
    point: Waypoint,
    column: TableColumn,
    value: f64,
    config: &Configuration,
) -> Waypoint {
    match column {
        TableColumn::Time => {
            Waypoint::new(config.time_scale_profile.to_seconds(value), point.temperature)
        }
        TableColumn::Temperature => Waypoint::new(point.time_s, value),
    }
}
