use std::time::Duration;

use crossbeam_channel::Receiver;
use eframe::{egui, Frame};

use super::state::AppState;
use crate::config::AppConfig;
use crate::plotter::StreamPlots;
use crate::recorder::{RecorderHandle, RecorderStatus};
use crate::types::Snapshot;

pub struct ViewerApp {
    pub state: AppState,
    pub plots: StreamPlots,
    pub window_seconds: f64,
}

impl ViewerApp {
    pub fn new(
        snapshot_rx: Receiver<Snapshot>,
        recorder: RecorderHandle,
        recorder_status_rx: Receiver<RecorderStatus>,
        config: &AppConfig,
    ) -> Self {
        Self {
            state: AppState::new(snapshot_rx, recorder, recorder_status_rx),
            plots: StreamPlots::new(&config.plot),
            window_seconds: config.plot.trailing_window_ms as f64 / 1000.0,
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        ctx.set_visuals(egui::Visuals::light());

        self.state.poll_snapshots();
        self.state.poll_recorder_status();

        crate::app::ui::render_status_bar(self, ctx);
        crate::app::ui::render_bottom_status_bar(self, ctx);
        crate::app::ui::render_main_panel(self, ctx);

        ctx.request_repaint_after(Duration::from_millis(80));
    }
}
