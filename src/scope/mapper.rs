/// Linear map from the value domain of a channel onto its vertical band.
///
/// The default domain is `[0, -2000]`: zero sits at the top of the band and
/// larger negative values are drawn further down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueDomain {
    pub top: f64,
    pub bottom: f64,
}
impl Default for ValueDomain {
    fn default() -> Self {
        Self {
            top: 0.0,
            bottom: -2000.0,
        }
    }
}
impl ValueDomain {
    pub fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }
    pub fn is_degenerate(&self) -> bool {
        !(self.top - self.bottom).is_normal()
    }
    /// Position of `value` inside a band of the given height.
    pub fn map_value(&self, value: f64, band_height: f64) -> f64 {
        (value - self.top) / (self.bottom - self.top) * band_height
    }
    pub fn map_y(&self, value: f64, channel: usize, channels: usize, height: f64) -> f64 {
        let band = band_height(channels, height);
        band_offset(channel, channels, height) + self.map_value(value, band)
    }
}
pub fn map_x(t: f64, seconds: f64, width: f64) -> f64 {
    t / seconds * width
}
/// `map_y` over the default domain.
pub fn map_y(value: f64, channel: usize, channels: usize, height: f64) -> f64 {
    ValueDomain::default().map_y(value, channel, channels, height)
}
pub fn band_height(channels: usize, height: f64) -> f64 {
    height / channels.max(1) as f64
}
pub fn band_offset(channel: usize, channels: usize, height: f64) -> f64 {
    channel as f64 * band_height(channels, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn map_x_spans_the_width() {
        assert_eq!(map_x(0.0, 4.0, 800.0), 0.0);
        assert_eq!(map_x(4.0, 4.0, 800.0), 800.0);
        assert_eq!(map_x(1.0, 4.0, 800.0), 200.0);
        assert_eq!(map_x(1.0, 4.0, 800.0), map_x(1.0, 4.0, 800.0));
    }
    #[test]
    fn channels_stack_top_to_bottom() {
        // 4 channels on 400px: 100px bands
        assert_eq!(map_y(0.0, 0, 4, 400.0), 0.0);
        assert_eq!(map_y(0.0, 2, 4, 400.0), 200.0);
        assert_eq!(map_y(-1000.0, 0, 4, 400.0), 50.0);
        assert_eq!(map_y(-2000.0, 3, 4, 400.0), 400.0);
        // positive values rise above the band top
        assert_eq!(map_y(500.0, 1, 4, 400.0), 75.0);
    }
    #[test]
    fn custom_domain() {
        let domain = ValueDomain::new(100.0, -100.0);
        assert_eq!(domain.map_y(100.0, 1, 2, 200.0), 100.0);
        assert_eq!(domain.map_y(0.0, 1, 2, 200.0), 150.0);
        assert!(ValueDomain::new(1.0, 1.0).is_degenerate());
        assert!(!ValueDomain::default().is_degenerate());
    }
}
