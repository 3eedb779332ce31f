// src/scope/mod.rs
pub mod backoff;
pub mod decoder;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod plot;
pub mod poller;
pub mod render;
pub mod source;
pub mod surface;
pub mod sweep;
pub use backoff::{Backoff, BackoffState};
pub use decoder::{Column, FrameDecoder, Payload};
pub use error::ScopeError;
pub use mapper::{map_x, map_y, ValueDomain};
pub use pipeline::{Cycle, SweepPipeline};
pub use plot::{BitmapSurface, PngScreen};
pub use poller::{Poller, ScheduleHandle};
pub use render::{Color, Renderer, Screen, Surface, TraceStyle, DEFAULT_BACKGROUND, PAIRED};
pub use source::{ManualTransport, Scripted, Transport, WebSocketTransport};
pub use surface::{DisplayList, DrawCommand, Polyline, RecordingScreen, TransformStack};
pub use sweep::{partition, Partition, SweepPartitioner, SweepState};
