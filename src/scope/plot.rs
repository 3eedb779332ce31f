use std::io::Cursor;
use std::path::PathBuf;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::{BitMapBackend, IntoDrawingArea, PathElement, RGBColor, ShapeStyle};
use crate::scope::error::ScopeError;
use crate::scope::render::{Color, Screen, Surface, TraceStyle};
use crate::scope::surface::TransformStack;

fn to_rgb(color: Color) -> RGBColor {
    RGBColor(color.r, color.g, color.b)
}
/// RGB raster drawn through plotters' bitmap backend.
pub struct BitmapSurface {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    transform: TransformStack,
    path: Vec<(i32, i32)>,
    error: Option<ScopeError>,
}
impl BitmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, ScopeError> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(3))
            .filter(|len| *len > 0)
            .ok_or_else(|| {
                ScopeError::Render(format!("cannot allocate a {width}x{height} bitmap"))
            })?;
        Ok(Self {
            width,
            height,
            buffer: vec![0u8; len],
            transform: TransformStack::default(),
            path: Vec::new(),
            error: None,
        })
    }
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * 3;
        Some(Color::rgb(
            self.buffer[at],
            self.buffer[at + 1],
            self.buffer[at + 2],
        ))
    }
    /// Encodes the current raster. Fails if any earlier draw call failed.
    pub fn to_png(&self) -> Result<Vec<u8>, ScopeError> {
        if let Some(err) = &self.error {
            return Err(ScopeError::Render(err.to_string()));
        }
        encode_png(&self.buffer, self.width, self.height)
    }
    fn keep_first_error(&mut self, result: Result<(), ScopeError>) {
        if let Err(err) = result {
            log::warn!("bitmap draw failed: {err}");
            self.error.get_or_insert(err);
        }
    }
}
impl Surface for BitmapSurface {
    fn size(&self) -> (f64, f64) {
        (self.width as f64, self.height as f64)
    }
    fn fill_background(&mut self, color: Color) {
        let result = {
            let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
                .into_drawing_area();
            root.fill(&to_rgb(color)).and_then(|_| root.present())
        };
        self.keep_first_error(result.map_err(ScopeError::from));
    }
    fn begin_path(&mut self) {
        self.path.clear();
    }
    fn line_to(&mut self, x: f64, y: f64) {
        let (x, y) = self.transform.apply(x, y);
        self.path.push((x.round() as i32, y.round() as i32));
    }
    fn stroke_path(&mut self, style: TraceStyle) {
        if self.path.len() < 2 {
            return;
        }
        let width = style.width.round().max(1.0) as u32;
        let shape = ShapeStyle::from(&to_rgb(style.color)).stroke_width(width);
        let element = PathElement::new(self.path.clone(), shape);
        let result = {
            let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
                .into_drawing_area();
            root.draw(&element).and_then(|_| root.present())
        };
        self.keep_first_error(result.map_err(ScopeError::from));
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
/// Headless screen: every presented cycle overwrites a PNG on disk.
pub struct PngScreen {
    surface: BitmapSurface,
    path: PathBuf,
    diagnostics: String,
}
impl PngScreen {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Result<Self, ScopeError> {
        Ok(Self {
            surface: BitmapSurface::new(width, height)?,
            path: path.into(),
            diagnostics: String::new(),
        })
    }
    pub fn diagnostics(&self) -> &str {
        &self.diagnostics
    }
}
impl Surface for PngScreen {
    fn size(&self) -> (f64, f64) {
        self.surface.size()
    }
    fn fill_background(&mut self, color: Color) {
        self.surface.fill_background(color);
    }
    fn begin_path(&mut self) {
        self.surface.begin_path();
    }
    fn line_to(&mut self, x: f64, y: f64) {
        self.surface.line_to(x, y);
    }
    fn stroke_path(&mut self, style: TraceStyle) {
        self.surface.stroke_path(style);
    }
    fn save(&mut self) {
        self.surface.save();
    }
    fn restore(&mut self) {
        self.surface.restore();
    }
    fn translate(&mut self, dx: f64, dy: f64) {
        self.surface.translate(dx, dy);
    }
}
impl Screen for PngScreen {
    fn set_diagnostics(&mut self, text: &str) {
        self.diagnostics = text.to_owned();
    }
    fn present(&mut self) -> Result<(), ScopeError> {
        let png = self.surface.to_png()?;
        std::fs::write(&self.path, png)?;
        log::debug!("snapshot {} [{}]", self.path.display(), self.diagnostics);
        Ok(())
    }
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ScopeError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ScopeError::Render("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
