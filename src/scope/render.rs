use std::fmt;
use serde::{Deserialize, Serialize};
use crate::scope::mapper::{band_height, band_offset, map_x, ValueDomain};
use crate::scope::ScopeError;
use crate::types::SampleFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}
impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
    /// Parses `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(text: &str) -> Result<Self, ScopeError> {
        let hex = text.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ScopeError::Config(format!("`{text}` is not a #rrggbb color")));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| ScopeError::Config(format!("`{text}` is not a #rrggbb color")))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
impl TryFrom<String> for Color {
    type Error = ScopeError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}
impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

pub const DEFAULT_BACKGROUND: Color = Color::rgb(0x30, 0x30, 0x30);

/// First six entries of the "Paired" categorical scheme: light/dark pairs.
pub const PAIRED: [Color; 6] = [
    Color::rgb(0xa6, 0xce, 0xe3),
    Color::rgb(0x1f, 0x78, 0xb4),
    Color::rgb(0xb2, 0xdf, 0x8a),
    Color::rgb(0x33, 0xa0, 0x2c),
    Color::rgb(0xfb, 0x9a, 0x99),
    Color::rgb(0xe3, 0x1a, 0x1c),
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceStyle {
    pub color: Color,
    pub width: f64,
}

/// Minimal canvas-like drawing target.
///
/// `line_to` on an empty path starts the path. `stroke_path` draws the current
/// path and keeps it until the next `begin_path`. Coordinates passed to
/// `line_to` are offset by the translation in effect at the time of the call.
pub trait Surface {
    fn size(&self) -> (f64, f64);
    fn fill_background(&mut self, color: Color);
    fn begin_path(&mut self);
    fn line_to(&mut self, x: f64, y: f64);
    fn stroke_path(&mut self, style: TraceStyle);
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, dx: f64, dy: f64);
}

/// A surface that is shown to someone: it also carries the diagnostics line
/// and is told when a cycle finished drawing.
pub trait Screen: Surface {
    fn set_diagnostics(&mut self, text: &str);
    fn present(&mut self) -> Result<(), ScopeError> {
        Ok(())
    }
}

/// Draws the old/new groups of a cycle, one band per channel.
#[derive(Clone, Debug)]
pub struct Renderer {
    background: Color,
    domain: ValueDomain,
    palette: Vec<Color>,
    line_width: f64,
}
impl Default for Renderer {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND,
            domain: ValueDomain::default(),
            palette: PAIRED.to_vec(),
            line_width: 1.0,
        }
    }
}
impl Renderer {
    pub fn new(background: Color, domain: ValueDomain) -> Self {
        Self {
            background,
            domain,
            ..Self::default()
        }
    }
    pub fn background(&self) -> Color {
        self.background
    }
    pub fn old_style(&self, channel: usize) -> TraceStyle {
        self.style_at(channel * 2 + 1)
    }
    pub fn new_style(&self, channel: usize) -> TraceStyle {
        self.style_at(channel * 2)
    }
    fn style_at(&self, index: usize) -> TraceStyle {
        TraceStyle {
            color: self.palette[index % self.palette.len()],
            width: self.line_width,
        }
    }
    pub fn render<S: Surface + ?Sized>(
        &self,
        old: &[SampleFrame],
        new: &[SampleFrame],
        seconds: f64,
        channels: usize,
        surface: &mut S,
    ) {
        let (width, height) = surface.size();
        surface.fill_background(self.background);
        let band = band_height(channels, height);
        for channel in 0..channels {
            surface.save();
            surface.translate(0.0, band_offset(channel, channels, height));
            self.trace(old, channel, seconds, width, band, self.old_style(channel), surface);
            self.trace(new, channel, seconds, width, band, self.new_style(channel), surface);
            surface.restore();
        }
    }
    #[allow(clippy::too_many_arguments)]
    fn trace<S: Surface + ?Sized>(
        &self,
        frames: &[SampleFrame],
        channel: usize,
        seconds: f64,
        width: f64,
        band: f64,
        style: TraceStyle,
        surface: &mut S,
    ) {
        if frames.is_empty() {
            return;
        }
        surface.begin_path();
        for frame in frames {
            if let Some(&value) = frame.values.get(channel) {
                surface.line_to(
                    map_x(frame.phase(seconds), seconds, width),
                    self.domain.map_value(value, band),
                );
            }
        }
        surface.stroke_path(style);
    }
}
