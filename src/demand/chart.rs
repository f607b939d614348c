use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::demand::{DemandError, Field, TimeSeriesTable};

/// Size of the look-ahead frame the horizon slider moves within
pub const LOOKAHEAD_POINTS: usize = 120;
pub const MAX_HORIZON_HOURS: u32 = LOOKAHEAD_POINTS as u32 - 1;

pub const Y_AXIS_TITLE: &str = "Demanda total [MW]";
const FONT_COLOR: &str = "#2cfec1";
const GRID_COLOR: &str = "#7C7C7C";
const TRANSPARENT: &str = "rgba(0,0,0,0)";
const BAND_MARKER_COLOR: &str = "#444";
const BAND_FILL_COLOR: &str = "rgba(242, 255, 251, 0.3)";

/// Start timestamp and forecast horizon picked in the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRequest {
    pub start: DateTime<Utc>,
    pub horizon_hours: u32,
}

impl ViewRequest {
    pub fn new(start: DateTime<Utc>, horizon_hours: u32) -> Self {
        Self {
            start,
            horizon_hours,
        }
    }

    /// Build a request from the three dashboard controls.
    ///
    /// Returns `Ok(None)` while any control is still unset, in which case the
    /// caller leaves the current chart alone. Hour 24 is midnight of the
    /// following day.
    pub fn from_inputs(
        date: Option<NaiveDate>,
        hour: Option<u32>,
        horizon_hours: Option<u32>,
    ) -> Result<Option<Self>, DemandError> {
        let (Some(date), Some(hour), Some(horizon_hours)) = (date, hour, horizon_hours) else {
            return Ok(None);
        };

        if hour > 24 {
            return Err(DemandError::InvalidHour(hour));
        }

        let start = date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(hour as i64);

        Ok(Some(Self::new(start, horizon_hours)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Shade down to the previous series
    ToNextY,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub mode: FillMode,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStyle {
    pub color: Option<&'static str>,
    pub line_width: Option<f64>,
    pub marker_color: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: &'static str,
    pub field: Field,
    pub x: Vec<DateTime<Utc>>,
    pub y: Vec<f64>,
    pub style: SeriesStyle,
    pub show_legend: bool,
    pub fill: Option<Fill>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendLayout {
    pub horizontal: bool,
    pub x: f64,
    pub y: f64,
    pub x_anchor: &'static str,
    pub y_anchor: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLayout {
    pub legend: LegendLayout,
    pub y_axis_title: &'static str,
    pub hover_by_x: bool,
    pub background: &'static str,
    pub font_color: &'static str,
    pub grid_color: &'static str,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            legend: LegendLayout {
                horizontal: true,
                x: 1.0,
                y: 1.02,
                x_anchor: "right",
                y_anchor: "bottom",
            },
            y_axis_title: Y_AXIS_TITLE,
            hover_by_x: true,
            background: TRANSPARENT,
            font_color: FONT_COLOR,
            grid_color: GRID_COLOR,
        }
    }
}

/// Renderer-independent description of the demand chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub series: Vec<Series>,
    pub layout: ChartLayout,
}

impl ChartSpec {
    /// Number of points in each series
    pub fn visible_len(&self) -> usize {
        self.series.first().map(|s| s.x.len()).unwrap_or(0)
    }
}

fn series_template(field: Field) -> (&'static str, SeriesStyle, bool, Option<Fill>) {
    match field {
        Field::ObservedDemand => (
            "Demanda energética",
            SeriesStyle {
                color: Some("#188463"),
                line_width: None,
                marker_color: None,
            },
            true,
            None,
        ),
        Field::Forecast => (
            "Proyección",
            SeriesStyle {
                color: Some("#bbffeb"),
                line_width: None,
                marker_color: None,
            },
            true,
            None,
        ),
        Field::UpperBound => (
            "Upper Bound",
            SeriesStyle {
                color: None,
                line_width: Some(0.0),
                marker_color: Some(BAND_MARKER_COLOR),
            },
            false,
            None,
        ),
        Field::LowerBound => (
            "Lower Bound",
            SeriesStyle {
                color: None,
                line_width: Some(0.0),
                marker_color: Some(BAND_MARKER_COLOR),
            },
            false,
            Some(Fill {
                mode: FillMode::ToNextY,
                color: BAND_FILL_COLOR,
            }),
        ),
    }
}

/// Slice the table for `request` and describe the four demand series.
///
/// The window starts at the first row `>= request.start` and drops the last
/// `LOOKAHEAD_POINTS - horizon_hours` rows of what remains, so a longer
/// horizon shows more of the trailing data.
pub fn build_chart(
    table: &TimeSeriesTable,
    request: &ViewRequest,
) -> Result<ChartSpec, DemandError> {
    if request.horizon_hours > MAX_HORIZON_HOURS {
        return Err(DemandError::InvalidHorizon {
            value: request.horizon_hours,
            max: MAX_HORIZON_HOURS,
        });
    }

    let columns = Field::ALL
        .iter()
        .map(|&field| {
            table
                .column(field)
                .map(|values| (field, values))
                .ok_or_else(|| DemandError::MissingField(field.column_name().to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let from = table.position_at_or_after(request.start);
    let available = table.len() - from;
    let trim = LOOKAHEAD_POINTS - request.horizon_hours as usize;

    if available <= trim {
        return Err(DemandError::InsufficientData {
            available,
            required: trim + 1,
        });
    }

    let to = table.len() - trim;
    let x = table.index()[from..to].to_vec();

    let series = columns
        .into_iter()
        .map(|(field, values)| {
            let (name, style, show_legend, fill) = series_template(field);
            Series {
                name,
                field,
                x: x.clone(),
                y: values[from..to].to_vec(),
                style,
                show_legend,
                fill,
            }
        })
        .collect();

    Ok(ChartSpec {
        series,
        layout: ChartLayout::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::tests::january_table;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn jan(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_window_length_follows_horizon() {
        let table = january_table();
        // 2021-01-20 00:00 through 2021-01-31 23:00
        let remaining = 12 * 24;

        let at_zero = build_chart(&table, &ViewRequest::new(jan(20, 0), 0)).unwrap();
        assert_eq!(at_zero.visible_len(), remaining - 120);

        let at_max = build_chart(&table, &ViewRequest::new(jan(20, 0), 119)).unwrap();
        assert_eq!(at_max.visible_len(), remaining - 1);
        assert_eq!(at_max.visible_len() - at_zero.visible_len(), 119);
    }

    #[test]
    fn test_each_horizon_step_adds_one_point() {
        let table = january_table();
        let mut previous = None;
        for horizon in 0..=MAX_HORIZON_HOURS {
            let len = build_chart(&table, &ViewRequest::new(jan(10, 6), horizon))
                .unwrap()
                .visible_len();
            if let Some(prev) = previous {
                assert_eq!(len, prev + 1);
            }
            previous = Some(len);
        }
    }

    #[test]
    fn test_series_share_x_and_styling() {
        let table = january_table();
        let chart = build_chart(&table, &ViewRequest::new(jan(25, 0), 30)).unwrap();

        assert_eq!(chart.series.len(), 4);
        let x = &chart.series[0].x;
        assert_eq!(x[0], jan(25, 0));
        for series in &chart.series {
            assert_eq!(&series.x, x);
            assert_eq!(series.y.len(), x.len());
        }

        let fields: Vec<_> = chart.series.iter().map(|s| s.field).collect();
        assert_eq!(fields, Field::ALL.to_vec());

        let (upper, lower) = (&chart.series[2], &chart.series[3]);
        assert!(!upper.show_legend && !lower.show_legend);
        assert!(upper.fill.is_none());
        assert_eq!(lower.fill.as_ref().map(|f| f.mode), Some(FillMode::ToNextY));
        assert_eq!(chart.layout.y_axis_title, Y_AXIS_TITLE);
        assert!(chart.layout.hover_by_x);
    }

    #[test]
    fn test_start_between_rows_is_inclusive_of_next() {
        let table = january_table();
        let start = jan(25, 0) + Duration::minutes(30);
        let chart = build_chart(&table, &ViewRequest::new(start, 0)).unwrap();
        assert_eq!(chart.series[0].x[0], jan(25, 1));
    }

    #[test]
    fn test_same_request_same_chart() {
        let table = january_table();
        let request = ViewRequest::new(jan(15, 12), 42);
        assert_eq!(
            build_chart(&table, &request).unwrap(),
            build_chart(&table, &request).unwrap()
        );
    }

    #[test]
    fn test_insufficient_data() {
        let table = january_table();

        // exactly 120 rows left: horizon 0 would show nothing
        let err = build_chart(&table, &ViewRequest::new(jan(27, 0), 0)).unwrap_err();
        assert!(matches!(
            err,
            DemandError::InsufficientData { available: 120, required: 121 }
        ));
        assert!(build_chart(&table, &ViewRequest::new(jan(27, 0), 1)).is_ok());

        let after_end = jan(31, 23) + Duration::hours(5);
        let err = build_chart(&table, &ViewRequest::new(after_end, 119)).unwrap_err();
        assert!(matches!(err, DemandError::InsufficientData { available: 0, .. }));
    }

    #[test]
    fn test_horizon_out_of_range() {
        let table = january_table();
        let err = build_chart(&table, &ViewRequest::new(jan(1, 0), 120)).unwrap_err();
        assert!(matches!(err, DemandError::InvalidHorizon { value: 120, max: 119 }));
    }

    #[test]
    fn test_missing_lower_bound() {
        let table = january_table();
        let columns: HashMap<_, _> = [Field::ObservedDemand, Field::Forecast, Field::UpperBound]
            .into_iter()
            .map(|f| (f, table.column(f).unwrap().to_vec()))
            .collect();
        let partial = TimeSeriesTable::new(table.index().to_vec(), columns).unwrap();

        let err = build_chart(&partial, &ViewRequest::new(jan(1, 0), 0)).unwrap_err();
        assert!(matches!(err, DemandError::MissingField(ref c) if c == "Lower bound"));
    }

    #[test]
    fn test_from_inputs() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 20);

        assert_eq!(ViewRequest::from_inputs(None, Some(3), Some(0)).unwrap(), None);
        assert_eq!(ViewRequest::from_inputs(date, None, Some(0)).unwrap(), None);
        assert_eq!(ViewRequest::from_inputs(date, Some(3), None).unwrap(), None);

        let request = ViewRequest::from_inputs(date, Some(3), Some(10)).unwrap().unwrap();
        assert_eq!(request, ViewRequest::new(jan(20, 3), 10));

        let midnight = ViewRequest::from_inputs(date, Some(24), Some(0)).unwrap().unwrap();
        assert_eq!(midnight.start, jan(21, 0));

        assert!(matches!(
            ViewRequest::from_inputs(date, Some(25), Some(0)),
            Err(DemandError::InvalidHour(25))
        ));
    }
}
