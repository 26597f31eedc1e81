use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotBounds, PlotPoints};

use crate::config::PlotConfig;
use crate::types::{Record, Snapshot, StreamSlice};

/// Formats a y axis label at a stable width so the plot column does not
/// jitter as the range changes.
fn format_y_label(value: f64) -> String {
    if value.abs() >= 1000.0 {
        format!("{:-6.1e}", value)
    } else if value.abs() >= 10.0 {
        format!("{:-6.1}", value)
    } else {
        format!("{:-6.2}", value)
    }
}

#[derive(Clone, Copy)]
enum Panel {
    Acceleration,
    Jerk,
}

impl Panel {
    fn title(&self) -> &'static str {
        match self {
            Panel::Acceleration => "Acceleration",
            Panel::Jerk => "Jerk",
        }
    }

    fn series_names(&self) -> [&'static str; 3] {
        match self {
            Panel::Acceleration => ["X", "Y", "Z"],
            Panel::Jerk => ["dX", "dY", "dZ"],
        }
    }

    fn values(&self, record: &Record) -> [f32; 3] {
        match self {
            Panel::Acceleration => [record.x, record.y, record.z],
            Panel::Jerk => [record.dx, record.dy, record.dz],
        }
    }
}

/// Live per-stream panels: acceleration on the left, jerk on the right,
/// one row per stream in first-seen order. The x axis is the trailing
/// offset in milliseconds, newest sample at zero.
pub struct StreamPlots {
    window_s: f64,
    plot_height: f32,
    colors: [Color32; 3],
}

impl StreamPlots {
    pub fn new(config: &PlotConfig) -> Self {
        let c = &config.colors;
        Self {
            window_s: config.trailing_window_ms as f64 / 1000.0,
            plot_height: config.plot_height,
            colors: [
                Color32::from_rgb(c.x_axis[0], c.x_axis[1], c.x_axis[2]),
                Color32::from_rgb(c.y_axis[0], c.y_axis[1], c.y_axis[2]),
                Color32::from_rgb(c.z_axis[0], c.z_axis[1], c.z_axis[2]),
            ],
        }
    }

    pub fn ui(&self, ui: &mut egui::Ui, snapshot: &Snapshot) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            for slice in &snapshot.streams {
                if slice.records.is_empty() {
                    continue;
                }
                ui.heading(format!("Stream {}", slice.stream_id));
                ui.columns(2, |columns| {
                    self.plot_panel(&mut columns[0], slice, Panel::Acceleration);
                    self.plot_panel(&mut columns[1], slice, Panel::Jerk);
                });
                ui.separator();
            }
        });
    }

    fn plot_panel(&self, ui: &mut egui::Ui, slice: &StreamSlice, panel: Panel) {
        let newest = match slice.records.last() {
            Some(record) => record.tstamp,
            None => return,
        };
        let cutoff = newest - self.window_s;
        let window: Vec<&Record> = slice
            .records
            .iter()
            .filter(|r| r.tstamp > cutoff)
            .collect();

        let (y_min, y_max) = self.y_range(&window, panel);
        let window_ms = self.window_s * 1000.0;

        Plot::new(format!("stream_{}_{}", slice.stream_id, panel.title()))
            .height(self.plot_height)
            .legend(Legend::default())
            .x_axis_formatter(|v, _| format!("{:.0} ms", v.value))
            .y_axis_formatter(|v, _| format_y_label(v.value))
            .show_x(false)
            .show_y(false)
            .allow_drag(false)
            .allow_zoom(false)
            .show(ui, |plot_ui| {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [-window_ms, y_min],
                    [0.0, y_max],
                ));
                for axis in 0..3 {
                    let points: Vec<[f64; 2]> = window
                        .iter()
                        .filter_map(|r| {
                            let value = panel.values(r)[axis];
                            value.is_finite().then(|| {
                                [(r.tstamp - newest) * 1000.0, value as f64]
                            })
                        })
                        .collect();
                    plot_ui.line(
                        Line::new(panel.series_names()[axis], PlotPoints::from(points))
                            .color(self.colors[axis])
                            .width(1.0),
                    );
                }
            });
    }

    /// Acceleration uses a fixed ±2 g range; jerk follows the data, with a
    /// default range when every derivative in the window is NaN (the
    /// stream's very first publish).
    fn y_range(&self, window: &[&Record], panel: Panel) -> (f64, f64) {
        if matches!(panel, Panel::Acceleration) {
            return (-2.0, 2.0);
        }
        let (min, max) = window
            .iter()
            .flat_map(|r| panel.values(r))
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
                (min.min(v as f64), max.max(v as f64))
            });
        if !min.is_finite() || !max.is_finite() {
            return (-1.0, 1.0);
        }
        let pad = (max - min).max(0.1) * 0.05;
        (min - pad, max + pad)
    }
}
