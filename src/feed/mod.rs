// src/feed/mod.rs
pub mod codec;
pub mod device;
pub mod generator;
pub mod receiver;
pub mod server;
pub mod store;
pub use codec::{decode_body, decode_header, encode_header, encode_packet, PacketHeader};
pub use device::DeviceServer;
pub use generator::{unix_seconds, SyntheticSource};
pub use receiver::{pump, receive, receive_forever};
pub use server::{parse_count, FeedServer};
pub use store::{BatchStore, FeedBatch, Snapshot};
