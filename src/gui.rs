// src/gui.rs
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use eframe::egui;
use egui::{Color32, Pos2, Rect, Rounding, Shape, Stroke, Vec2};
use tokio::sync::mpsc::UnboundedSender;
use crate::config::ScopeConfig;
use crate::engine::{ViewerCommand, ViewerEvent};
use crate::scope::{Color, RecordingScreen, Surface, TraceStyle, TransformStack};

const MAX_LOG_LINES: usize = 50;

fn to_color32(color: Color) -> Color32 {
    Color32::from_rgb(color.r, color.g, color.b)
}

/// Turns surface calls into egui shapes placed relative to `origin`.
pub struct EguiSurface {
    origin: Pos2,
    size: Vec2,
    transform: TransformStack,
    path: Vec<Pos2>,
    shapes: Vec<Shape>,
}
impl EguiSurface {
    pub fn new(rect: Rect) -> Self {
        Self {
            origin: rect.min,
            size: rect.size(),
            transform: TransformStack::default(),
            path: Vec::new(),
            shapes: Vec::new(),
        }
    }
    pub fn into_shapes(self) -> Vec<Shape> {
        self.shapes
    }
}
impl Surface for EguiSurface {
    fn size(&self) -> (f64, f64) {
        (self.size.x as f64, self.size.y as f64)
    }
    fn fill_background(&mut self, color: Color) {
        self.shapes.clear();
        self.shapes.push(Shape::rect_filled(
            Rect::from_min_size(self.origin, self.size),
            Rounding::ZERO,
            to_color32(color),
        ));
    }
    fn begin_path(&mut self) {
        self.path.clear();
    }
    fn line_to(&mut self, x: f64, y: f64) {
        let (x, y) = self.transform.apply(x, y);
        self.path.push(self.origin + Vec2::new(x as f32, y as f32));
    }
    fn stroke_path(&mut self, style: TraceStyle) {
        let color = to_color32(style.color);
        match self.path.as_slice() {
            [] => {}
            [point] => self
                .shapes
                .push(Shape::circle_filled(*point, style.width as f32 / 2.0, color)),
            points => self.shapes.push(Shape::line(
                points.to_vec(),
                Stroke::new(style.width as f32, color),
            )),
        }
    }
    fn save(&mut self) {
        self.transform.save();
    }
    fn restore(&mut self) {
        self.transform.restore();
    }
    fn translate(&mut self, dx: f64, dy: f64) {
        self.transform.translate(dx, dy);
    }
}

pub struct ScopeApp {
    screen: Arc<Mutex<RecordingScreen>>,
    tx_cmd: UnboundedSender<ViewerCommand>,
    rx: Receiver<ViewerEvent>,
    background: Color,
    endpoint: String,
    is_running: bool,
    repaint_hooked: bool,
    log_messages: Vec<String>,
}
impl ScopeApp {
    pub fn new(
        config: &ScopeConfig,
        screen: Arc<Mutex<RecordingScreen>>,
        tx_cmd: UnboundedSender<ViewerCommand>,
        rx: Receiver<ViewerEvent>,
    ) -> Self {
        Self {
            screen,
            tx_cmd,
            rx,
            background: config.background_color,
            endpoint: config.endpoint.clone(),
            is_running: false,
            repaint_hooked: false,
            log_messages: vec!["sweepscope ready.".to_owned()],
        }
    }
    fn lock_screen(&self) -> MutexGuard<'_, RecordingScreen> {
        self.screen.lock().unwrap_or_else(PoisonError::into_inner)
    }
    fn log(&mut self, msg: &str) {
        self.log_messages.push(msg.to_owned());
        if self.log_messages.len() > MAX_LOG_LINES {
            self.log_messages.remove(0);
        }
    }
    fn send(&mut self, cmd: ViewerCommand) {
        if self.tx_cmd.send(cmd).is_err() {
            self.log("poller thread is gone");
        }
    }
    fn draw_scope(&self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::hover());
        let rect = response.rect;
        let mut screen = self.lock_screen();
        // Takes effect from the next cycle on.
        screen.resize(rect.width() as f64, rect.height() as f64);
        if screen.display_list().is_empty() {
            painter.rect_filled(rect, Rounding::ZERO, to_color32(self.background));
            return;
        }
        let mut surface = EguiSurface::new(rect);
        screen.display_list().replay(&mut surface);
        painter.extend(surface.into_shapes());
    }
}
impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.repaint_hooked {
            let repaint = ctx.clone();
            self.lock_screen().set_on_present(move || repaint.request_repaint());
            self.repaint_hooked = true;
        }
        while let Ok(event) = self.rx.try_recv() {
            match event {
                ViewerEvent::Log(msg) => self.log(&msg),
                ViewerEvent::Running(running) => self.is_running = running,
            }
        }
        ctx.set_visuals(egui::Visuals::dark());

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let btn_txt = if self.is_running { "PAUSE" } else { "RESUME" };
                if ui.button(btn_txt).clicked() {
                    if self.is_running {
                        self.send(ViewerCommand::Stop);
                    } else {
                        self.send(ViewerCommand::Start);
                    }
                }
                ui.label(&self.endpoint);
                ui.separator();
                let diagnostics = self.lock_screen().diagnostics().to_owned();
                ui.monospace(diagnostics);
            });
            egui::ScrollArea::vertical()
                .max_height(60.0)
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for m in &self.log_messages {
                        ui.monospace(m);
                    }
                });
        });
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.draw_scope(ui));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{DisplayList, PAIRED};

    fn style() -> TraceStyle {
        TraceStyle {
            color: PAIRED[1],
            width: 2.0,
        }
    }

    #[test]
    fn replays_a_display_list_as_shapes() {
        let mut list = DisplayList::new(100.0, 50.0);
        list.fill_background(Color::rgb(0x30, 0x30, 0x30));
        list.save();
        list.translate(0.0, 25.0);
        list.begin_path();
        list.line_to(0.0, 0.0);
        list.line_to(10.0, 5.0);
        list.stroke_path(style());
        list.begin_path();
        list.line_to(20.0, 0.0);
        list.stroke_path(style());
        list.restore();
        list.begin_path();
        list.stroke_path(style());

        let rect = Rect::from_min_size(Pos2::new(10.0, 20.0), Vec2::new(100.0, 50.0));
        let mut surface = EguiSurface::new(rect);
        list.replay(&mut surface);
        assert_eq!(surface.size(), (100.0, 50.0));
        let shapes = surface.into_shapes();
        assert_eq!(shapes.len(), 3);
        assert!(matches!(shapes[0], Shape::Rect(_)));
        match &shapes[1] {
            Shape::Path(path) => {
                assert_eq!(path.points, vec![Pos2::new(10.0, 45.0), Pos2::new(20.0, 50.0)]);
                assert_eq!(path.stroke.color, to_color32(PAIRED[1]));
            }
            other => panic!("expected a path, got {other:?}"),
        }
        assert!(matches!(shapes[2], Shape::Circle(_)));
    }
}
