use std::time::Duration;
use futures_util::{SinkExt, StreamExt};
use sweepscope::config::{FeedConfig, ScopeConfig};
use sweepscope::feed::{unix_seconds, DeviceServer, FeedBatch, FeedServer, SyntheticSource};
use sweepscope::scope::{
    FrameDecoder, RecordingScreen, SweepPipeline, Transport, WebSocketTransport,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};

// Nothing listens on port 1, so the store only holds what a test puts there.
fn feed_config() -> FeedConfig {
    FeedConfig {
        port: 0,
        sample_rate: 1.0,
        interval_ms: 60_000,
        channels: 4,
        device_port: 1,
        ..FeedConfig::default()
    }
}

async fn serve(config: &FeedConfig, prefill: usize) -> String {
    let server = FeedServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    {
        let store = server.store();
        let mut store = store.write().await;
        let mut source = SyntheticSource::with_seed(config.channels, config.sub_frames(), 5);
        for idx in 0..prefill as u64 {
            let query = unix_seconds();
            store.push(FeedBatch {
                idx,
                query,
                query2: query + 0.002,
                data: source.generate(),
            });
        }
    }
    tokio::spawn(server.run());
    format!("ws://{addr}/?accessToken=123456")
}

#[tokio::test]
async fn viewer_fetches_and_decodes_feed_batches() {
    let config = feed_config();
    let url = serve(&config, 3).await;
    let transport = WebSocketTransport::new(url).with_timeout(Some(Duration::from_secs(5)));
    let raw = transport.fetch(3).await.unwrap();

    let decoded = FrameDecoder::new(config.sub_frame_interval()).decode(&raw).unwrap();
    assert_eq!(decoded.channels, 4);
    assert_eq!(decoded.frames.len(), 3 * config.sub_frames());
    assert_eq!(decoded.latency.len(), 3);
    assert!(decoded.mean_latency() >= 0.0);
    // sub-frames of one batch are one sample period apart
    let step = decoded.frames[1].timestamp - decoded.frames[0].timestamp;
    assert!((step - 1.0).abs() < 1e-6);

    let pipeline = SweepPipeline::from_config(&ScopeConfig::default()).unwrap();
    let mut screen = RecordingScreen::new(300.0, 200.0);
    pipeline.run(&raw, &mut screen).unwrap();
    assert_eq!(screen.presented(), 1);
    assert!(!screen.display_list().is_empty());
}

#[tokio::test]
async fn invalid_count_closes_without_reply() {
    let url = serve(&feed_config(), 1).await;
    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
    ws.send(Message::Text("plenty".into())).await.unwrap();
    match ws.next().await {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
        Some(Ok(other)) => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn device_packets_reach_the_viewer() {
    let device_config = FeedConfig {
        device_port: 0,
        sample_rate: 100.0,
        interval_ms: 20,
        channels: 4,
        ..FeedConfig::default()
    };
    let device = DeviceServer::bind(&device_config).await.unwrap();
    let device_port = device.local_addr().unwrap().port();
    tokio::spawn(device.run());

    let config = FeedConfig {
        port: 0,
        device_port,
        ..device_config
    };
    let server = FeedServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let store = server.store();
    tokio::spawn(server.run());
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.read().await.len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let transport = WebSocketTransport::new(format!("ws://{addr}/?accessToken=123456"))
        .with_timeout(Some(Duration::from_secs(5)));
    let raw = transport.fetch(3).await.unwrap();
    let decoded = FrameDecoder::new(config.sub_frame_interval()).decode(&raw).unwrap();
    assert_eq!(decoded.channels, 4);
    assert_eq!(decoded.frames.len(), 3 * config.sub_frames());
    assert_eq!(decoded.latency.len(), 3);
    // confirm times are taken on receipt, after the device stamped the send
    assert!(decoded.latency.iter().all(|l| l.latency() >= 0.0));
}
