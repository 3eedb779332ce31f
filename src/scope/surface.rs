use crate::scope::render::{Color, Screen, Surface, TraceStyle};
use crate::scope::ScopeError;

/// Translation state with canvas-style save/restore.
#[derive(Clone, Debug, Default)]
pub struct TransformStack {
    offset: (f64, f64),
    saved: Vec<(f64, f64)>,
}
impl TransformStack {
    pub fn save(&mut self) {
        self.saved.push(self.offset);
    }
    pub fn restore(&mut self) {
        // Unbalanced restore is a no-op, like on a canvas.
        if let Some(offset) = self.saved.pop() {
            self.offset = offset;
        }
    }
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.offset = (self.offset.0 + dx, self.offset.1 + dy);
    }
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.offset.0, y + self.offset.1)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    FillBackground(Color),
    BeginPath,
    LineTo(f64, f64),
    StrokePath(TraceStyle),
    Save,
    Restore,
    Translate(f64, f64),
}

/// A stroked path resolved to absolute pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    pub style: TraceStyle,
    pub points: Vec<(f64, f64)>,
}

/// Surface that records what was drawn so it can be inspected or replayed
/// onto another surface later (e.g. on the UI thread).
#[derive(Clone, Debug, Default)]
pub struct DisplayList {
    width: f64,
    height: f64,
    commands: Vec<DrawCommand>,
}
impl DisplayList {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
    pub fn clear(&mut self) {
        self.commands.clear();
    }
    pub fn replay<S: Surface + ?Sized>(&self, target: &mut S) {
        for command in &self.commands {
            match *command {
                DrawCommand::FillBackground(color) => target.fill_background(color),
                DrawCommand::BeginPath => target.begin_path(),
                DrawCommand::LineTo(x, y) => target.line_to(x, y),
                DrawCommand::StrokePath(style) => target.stroke_path(style),
                DrawCommand::Save => target.save(),
                DrawCommand::Restore => target.restore(),
                DrawCommand::Translate(dx, dy) => target.translate(dx, dy),
            }
        }
    }
    pub fn strokes(&self) -> Vec<Polyline> {
        let mut transform = TransformStack::default();
        let mut path = Vec::new();
        let mut out = Vec::new();
        for command in &self.commands {
            match *command {
                DrawCommand::FillBackground(_) => {}
                DrawCommand::BeginPath => path.clear(),
                DrawCommand::LineTo(x, y) => path.push(transform.apply(x, y)),
                DrawCommand::StrokePath(style) => out.push(Polyline {
                    style,
                    points: path.clone(),
                }),
                DrawCommand::Save => transform.save(),
                DrawCommand::Restore => transform.restore(),
                DrawCommand::Translate(dx, dy) => transform.translate(dx, dy),
            }
        }
        out
    }
}
impl Surface for DisplayList {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }
    fn fill_background(&mut self, color: Color) {
        // Covers everything drawn so far.
        self.commands.clear();
        self.commands.push(DrawCommand::FillBackground(color));
    }
    fn begin_path(&mut self) {
        self.commands.push(DrawCommand::BeginPath);
    }
    fn line_to(&mut self, x: f64, y: f64) {
        self.commands.push(DrawCommand::LineTo(x, y));
    }
    fn stroke_path(&mut self, style: TraceStyle) {
        self.commands.push(DrawCommand::StrokePath(style));
    }
    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }
    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }
    fn translate(&mut self, dx: f64, dy: f64) {
        self.commands.push(DrawCommand::Translate(dx, dy));
    }
}

/// Screen backed by a display list. The viewer window shares one of these
/// with the poller and replays it every UI frame.
pub struct RecordingScreen {
    list: DisplayList,
    diagnostics: String,
    presented: u64,
    on_present: Option<Box<dyn Fn() + Send>>,
}
impl RecordingScreen {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            list: DisplayList::new(width, height),
            diagnostics: String::new(),
            presented: 0,
            on_present: None,
        }
    }
    /// Called after every presented cycle, e.g. to wake up a UI loop.
    pub fn set_on_present(&mut self, hook: impl Fn() + Send + 'static) {
        self.on_present = Some(Box::new(hook));
    }
    pub fn resize(&mut self, width: f64, height: f64) {
        self.list.resize(width, height);
    }
    pub fn display_list(&self) -> &DisplayList {
        &self.list
    }
    pub fn diagnostics(&self) -> &str {
        &self.diagnostics
    }
    pub fn presented(&self) -> u64 {
        self.presented
    }
}
impl Surface for RecordingScreen {
    fn size(&self) -> (f64, f64) {
        self.list.size()
    }
    fn fill_background(&mut self, color: Color) {
        self.list.fill_background(color);
    }
    fn begin_path(&mut self) {
        self.list.begin_path();
    }
    fn line_to(&mut self, x: f64, y: f64) {
        self.list.line_to(x, y);
    }
    fn stroke_path(&mut self, style: TraceStyle) {
        self.list.stroke_path(style);
    }
    fn save(&mut self) {
        self.list.save();
    }
    fn restore(&mut self) {
        self.list.restore();
    }
    fn translate(&mut self, dx: f64, dy: f64) {
        self.list.translate(dx, dy);
    }
}
impl Screen for RecordingScreen {
    fn set_diagnostics(&mut self, text: &str) {
        self.diagnostics = text.to_owned();
    }
    fn present(&mut self) -> Result<(), ScopeError> {
        self.presented += 1;
        if let Some(hook) = &self.on_present {
            hook();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::render::PAIRED;

    fn style() -> TraceStyle {
        TraceStyle {
            color: PAIRED[0],
            width: 1.0,
        }
    }

    #[test]
    fn fill_discards_previous_frame() {
        let mut list = DisplayList::new(10.0, 10.0);
        list.begin_path();
        list.line_to(1.0, 1.0);
        list.fill_background(Color::rgb(0, 0, 0));
        assert_eq!(list.commands().len(), 1);
    }

    #[test]
    fn nested_translations_resolve() {
        let mut list = DisplayList::new(10.0, 10.0);
        list.save();
        list.translate(0.0, 5.0);
        list.save();
        list.translate(2.0, 0.0);
        list.begin_path();
        list.line_to(1.0, 1.0);
        list.restore();
        list.line_to(1.0, 1.0);
        list.stroke_path(style());
        list.restore();
        list.restore();
        list.begin_path();
        list.line_to(1.0, 1.0);
        list.stroke_path(style());
        let strokes = list.strokes();
        assert_eq!(strokes[0].points, vec![(3.0, 6.0), (1.0, 6.0)]);
        assert_eq!(strokes[1].points, vec![(1.0, 1.0)]);
    }

    #[test]
    fn replay_reproduces_commands() {
        let mut list = DisplayList::new(10.0, 10.0);
        list.fill_background(Color::rgb(1, 2, 3));
        list.save();
        list.translate(0.0, 2.0);
        list.begin_path();
        list.line_to(0.0, 0.0);
        list.line_to(4.0, 4.0);
        list.stroke_path(style());
        list.restore();
        let mut copy = DisplayList::new(10.0, 10.0);
        list.replay(&mut copy);
        assert_eq!(copy.commands(), list.commands());
    }
}
