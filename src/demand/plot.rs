use plotly::common::{Anchor, Fill as PlotlyFill, Font, Line, Marker, Mode, Orientation, Title};
use plotly::layout::{Axis, HoverMode, Legend};
use plotly::{Layout, Plot, Scatter};

use crate::demand::chart::{ChartLayout, ChartSpec, FillMode, Series};

const X_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn anchor(name: &str) -> Anchor {
    match name {
        "left" => Anchor::Left,
        "center" => Anchor::Center,
        "top" => Anchor::Top,
        "middle" => Anchor::Middle,
        "bottom" => Anchor::Bottom,
        "right" => Anchor::Right,
        _ => Anchor::Auto,
    }
}

fn scatter(series: &Series) -> Box<Scatter<String, f64>> {
    let x = series
        .x
        .iter()
        .map(|ts| ts.format(X_FORMAT).to_string())
        .collect();

    let mut line = Line::new();
    if let Some(color) = series.style.color {
        line = line.color(color);
    }
    if let Some(width) = series.style.line_width {
        line = line.width(width);
    }

    let mut trace = Scatter::new(x, series.y.clone())
        .name(series.name)
        .mode(Mode::Lines)
        .line(line)
        .show_legend(series.show_legend);

    if let Some(color) = series.style.marker_color {
        trace = trace.marker(Marker::new().color(color));
    }
    if let Some(fill) = &series.fill {
        let mode = match fill.mode {
            FillMode::ToNextY => PlotlyFill::ToNextY,
        };
        trace = trace.fill(mode).fill_color(fill.color);
    }

    trace
}

fn layout(spec: &ChartLayout) -> Layout {
    let orientation = if spec.legend.horizontal {
        Orientation::Horizontal
    } else {
        Orientation::Vertical
    };

    let mut layout = Layout::new()
        .legend(
            Legend::new()
                .orientation(orientation)
                .x(spec.legend.x)
                .y(spec.legend.y)
                .x_anchor(anchor(spec.legend.x_anchor))
                .y_anchor(anchor(spec.legend.y_anchor)),
        )
        .paper_background_color(spec.background)
        .plot_background_color(spec.background)
        .font(Font::new().color(spec.font_color))
        .x_axis(Axis::new().show_grid(true).grid_color(spec.grid_color))
        .y_axis(
            Axis::new()
                .title(Title::with_text(spec.y_axis_title))
                .show_grid(true)
                .grid_color(spec.grid_color),
        );

    if spec.hover_by_x {
        layout = layout.hover_mode(HoverMode::X);
    }

    layout
}

/// Assemble the Plotly figure for a chart
pub fn to_plot(spec: &ChartSpec) -> Plot {
    let mut plot = Plot::new();
    for series in &spec.series {
        plot.add_trace(scatter(series));
    }
    plot.set_layout(layout(&spec.layout));
    plot
}

/// Plotly figure JSON (`data` and `layout`) ready for `Plotly.react`
pub fn to_figure(spec: &ChartSpec) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_str(&to_plot(spec).to_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::chart::{ViewRequest, build_chart};
    use crate::demand::tests::january_table;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_figure_traces() {
        let table = january_table();
        let start = Utc.with_ymd_and_hms(2021, 1, 25, 0, 0, 0).unwrap();
        let chart = build_chart(&table, &ViewRequest::new(start, 5)).unwrap();

        let figure = to_figure(&chart).unwrap();
        let traces = figure["data"].as_array().unwrap();
        assert_eq!(traces.len(), 4);

        assert_eq!(traces[0]["name"], "Demanda energética");
        assert_eq!(traces[0]["line"]["color"], "#188463");
        assert_eq!(traces[0]["x"][0], "2021-01-25 00:00:00");
        assert_eq!(
            traces[0]["x"].as_array().unwrap().len(),
            chart.visible_len()
        );

        assert_eq!(traces[2]["showlegend"], false);
        assert_eq!(traces[3]["fill"], "tonexty");
        assert_eq!(traces[3]["fillcolor"], "rgba(242, 255, 251, 0.3)");
    }

    #[test]
    fn test_figure_layout() {
        let table = january_table();
        let start = Utc.with_ymd_and_hms(2021, 1, 2, 0, 0, 0).unwrap();
        let chart = build_chart(&table, &ViewRequest::new(start, 0)).unwrap();

        let figure = to_figure(&chart).unwrap();
        let layout = &figure["layout"];
        assert_eq!(layout["hovermode"], "x");
        assert_eq!(layout["legend"]["orientation"], "h");
        assert_eq!(layout["legend"]["xanchor"], "right");
        assert_eq!(layout["yaxis"]["showgrid"], true);
        assert_eq!(layout["xaxis"]["showgrid"], true);
        assert_eq!(layout["yaxis"]["gridcolor"], "#7C7C7C");
        assert_eq!(layout["yaxis"]["title"]["text"], "Demanda total [MW]");
        assert_eq!(layout["paper_bgcolor"], "rgba(0,0,0,0)");
        assert_eq!(layout["plot_bgcolor"], "rgba(0,0,0,0)");
        assert_eq!(layout["font"]["color"], "#2cfec1");
        assert_eq!(layout["legend"]["yanchor"], "bottom");
        assert_eq!(layout["legend"]["y"], 1.02);
    }
}
