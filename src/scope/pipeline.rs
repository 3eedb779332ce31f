use crate::config::ScopeConfig;
use crate::scope::decoder::FrameDecoder;
use crate::scope::error::ScopeError;
use crate::scope::render::{Renderer, Screen};
use crate::scope::sweep::{Partition, SweepPartitioner};
use crate::types::Diagnostics;

/// A decoded and partitioned response, ready to draw.
#[derive(Clone, Debug)]
pub struct Cycle {
    pub partition: Partition,
    pub channels: usize,
    pub mean_latency: f64,
}
impl Cycle {
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            max: self.partition.state.max,
            sweep_pos: self.partition.state.sweep_pos,
            mean_latency: self.mean_latency,
        }
    }
}
/// The synchronous body of one poll cycle: decode, partition, draw.
#[derive(Clone, Debug)]
pub struct SweepPipeline {
    decoder: FrameDecoder,
    partitioner: SweepPartitioner,
    renderer: Renderer,
}
impl SweepPipeline {
    pub fn new(decoder: FrameDecoder, partitioner: SweepPartitioner, renderer: Renderer) -> Self {
        Self {
            decoder,
            partitioner,
            renderer,
        }
    }
    pub fn from_config(config: &ScopeConfig) -> Result<Self, ScopeError> {
        let partitioner = SweepPartitioner::new(config.display_period_seconds)?
            .with_guard_band(config.guard_band_fraction);
        Ok(Self::new(
            FrameDecoder::new(config.sub_frame_interval_seconds),
            partitioner,
            Renderer::new(config.background_color, config.value_domain()),
        ))
    }
    pub fn seconds(&self) -> f64 {
        self.partitioner.seconds()
    }
    pub fn prepare(&self, raw: &str) -> Result<Cycle, ScopeError> {
        let batch = self.decoder.decode(raw)?;
        let mean_latency = batch.mean_latency();
        let channels = batch.channels;
        let partition = self.partitioner.partition(batch.frames)?;
        log::debug!(
            "cycle: {} old, {} new, {} in guard band, {} channels",
            partition.old.len(),
            partition.new.len(),
            partition.dropped,
            channels
        );
        Ok(Cycle {
            partition,
            channels,
            mean_latency,
        })
    }
    pub fn draw<S: Screen + ?Sized>(
        &self,
        cycle: &Cycle,
        screen: &mut S,
    ) -> Result<Diagnostics, ScopeError> {
        self.renderer.render(
            &cycle.partition.old,
            &cycle.partition.new,
            self.seconds(),
            cycle.channels,
            screen,
        );
        let diagnostics = cycle.diagnostics();
        screen.set_diagnostics(&diagnostics.line());
        screen.present()?;
        Ok(diagnostics)
    }
    pub fn run<S: Screen + ?Sized>(
        &self,
        raw: &str,
        screen: &mut S,
    ) -> Result<Diagnostics, ScopeError> {
        let cycle = self.prepare(raw)?;
        self.draw(&cycle, screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::surface::RecordingScreen;

    #[test]
    fn runs_a_full_cycle() {
        let pipeline = SweepPipeline::from_config(&ScopeConfig::default()).unwrap();
        let mut screen = RecordingScreen::new(400.0, 200.0);
        let raw = r#"{"data": [[[1.0], [2.0]]], "query": [10.0], "query2": [10.5]}"#;
        let diagnostics = pipeline.run(raw, &mut screen).unwrap();
        assert_eq!(diagnostics.line(), "10.0010 | 2.0010 | 0.5000");
        assert_eq!(screen.diagnostics(), "10.0010 | 2.0010 | 0.5000");
        assert_eq!(screen.presented(), 1);
        // one point in the old group, nothing in the new one
        let strokes = screen.display_list().strokes();
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].points.len(), 1);
    }

    #[test]
    fn malformed_payload_draws_nothing() {
        let pipeline = SweepPipeline::from_config(&ScopeConfig::default()).unwrap();
        let mut screen = RecordingScreen::new(400.0, 200.0);
        let err = pipeline.run("{\"data\": 1}", &mut screen).unwrap_err();
        assert!(matches!(err, ScopeError::MalformedPayload(_)));
        assert!(screen.display_list().is_empty());
        assert_eq!(screen.presented(), 0);
    }

    #[test]
    fn empty_payload_is_an_empty_buffer() {
        let pipeline = SweepPipeline::from_config(&ScopeConfig::default()).unwrap();
        let mut screen = RecordingScreen::new(400.0, 200.0);
        let err = pipeline
            .run(r#"{"data": [], "query": [], "query2": []}"#, &mut screen)
            .unwrap_err();
        assert!(matches!(err, ScopeError::EmptyBuffer));
        assert_eq!(screen.presented(), 0);
    }
}
