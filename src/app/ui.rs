use eframe::egui;

use crate::app::viewer_app::ViewerApp;

pub fn render_status_bar(app: &mut ViewerApp, ctx: &egui::Context) {
    egui::TopBottomPanel::top("status_bar")
        .min_height(36.0)
        .show(ctx, |ui| {
            ui.add_space(5.0);
            ui.horizontal(|ui| {
                ui.label("Status:");

                let (status_text, status_color) = if app.state.stream_ended {
                    ("Stream ended", egui::Color32::from_rgb(150, 0, 0))
                } else if app.state.latest.is_some() {
                    ("Live", egui::Color32::from_rgb(0, 150, 0))
                } else {
                    ("Waiting for data", egui::Color32::from_rgb(255, 165, 0))
                };
                ui.colored_label(status_color, status_text);

                ui.separator();
                ui.label(format!(
                    "Streams: {}  Buffered: {} records",
                    app.state.stream_count(),
                    app.state.buffered_records()
                ));

                ui.separator();
                ui.label(format!("Window: {:.1}s", app.window_seconds));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let (label, color) = if app.state.recording.is_recording {
                        ("⏹ Stop", egui::Color32::from_rgb(150, 0, 0))
                    } else {
                        ("⏺ Record", egui::Color32::from_rgb(0, 100, 200))
                    };
                    let button = egui::Button::new(egui::RichText::new(label).color(color));
                    // Recording needs a live ingest loop behind it.
                    let enabled = !app.state.stream_ended || app.state.recording.is_recording;
                    if ui.add_enabled(enabled, button).clicked() {
                        app.state.toggle_recording();
                    }
                });
            });
            ui.add_space(5.0);
        });
}

pub fn render_bottom_status_bar(app: &mut ViewerApp, ctx: &egui::Context) {
    egui::TopBottomPanel::bottom("bottom_status_bar")
        .min_height(24.0)
        .show(ctx, |ui| {
            ui.add_space(3.0);
            ui.horizontal(|ui| {
                if !app.state.recording.status_line.is_empty() {
                    ui.colored_label(
                        egui::Color32::from_rgb(0, 100, 200),
                        &app.state.recording.status_line,
                    );
                    ui.separator();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    match &app.state.recording.current_file {
                        Some(path) => ui.label(format!("File: {}", path.display())),
                        None => ui.label("Recorder: idle"),
                    };
                });
            });
            ui.add_space(3.0);
        });
}

pub fn render_main_panel(app: &mut ViewerApp, ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        match &app.state.latest {
            Some(snapshot) if !snapshot.is_empty() => {
                app.plots.ui(ui, snapshot);
            }
            _ => {
                ui.centered_and_justified(|ui| {
                    let message = if app.state.stream_ended {
                        "Stream ended before any data arrived"
                    } else {
                        "Waiting for data..."
                    };
                    ui.label(message);
                });
            }
        }
    });
}
