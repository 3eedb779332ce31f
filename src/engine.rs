// src/engine.rs
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::mpsc::UnboundedReceiver;
use crate::config::ScopeConfig;
use crate::scope::{Poller, Screen, Transport};

/// Commands from the window to the poller thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerCommand {
    Start,
    Stop,
    Shutdown,
}

/// Status reports from the poller thread to the window.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerEvent {
    Log(String),
    Running(bool),
}

/// Runs the poller on its own single-threaded runtime. Polling starts right
/// away; the thread exits on `Shutdown` or when the command sender is dropped.
pub fn spawn_thread<T, S>(
    config: ScopeConfig,
    transport: T,
    screen: Arc<Mutex<S>>,
    tx: Sender<ViewerEvent>,
    mut rx_cmd: UnboundedReceiver<ViewerCommand>,
) -> thread::JoinHandle<()>
where
    T: Transport,
    S: Screen + Send + 'static,
{
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("failed to start poller runtime: {e}");
                tx.send(ViewerEvent::Log(format!("poller failed: {e}"))).ok();
                return;
            }
        };
        runtime.block_on(async move {
            let mut poller = match Poller::from_config(&config, transport, screen) {
                Ok(poller) => poller,
                Err(e) => {
                    log::error!("{e}");
                    tx.send(ViewerEvent::Log(e.to_string())).ok();
                    return;
                }
            };
            let mut handle = Some(poller.start());
            tx.send(ViewerEvent::Running(true)).ok();
            tx.send(ViewerEvent::Log(format!("polling {}", config.endpoint))).ok();
            while let Some(cmd) = rx_cmd.recv().await {
                match cmd {
                    ViewerCommand::Start => {
                        handle = Some(poller.start());
                        tx.send(ViewerEvent::Running(true)).ok();
                    }
                    ViewerCommand::Stop => {
                        if let Some(handle) = handle.take() {
                            poller.stop(handle);
                            tx.send(ViewerEvent::Log("paused".to_owned())).ok();
                        }
                        tx.send(ViewerEvent::Running(false)).ok();
                    }
                    ViewerCommand::Shutdown => break,
                }
            }
            log::info!("poller thread exiting");
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Duration;
    use crate::scope::{ManualTransport, RecordingScreen};

    fn next(rx: &std::sync::mpsc::Receiver<ViewerEvent>) -> ViewerEvent {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn commands_drive_the_schedule() {
        let screen = Arc::new(Mutex::new(RecordingScreen::new(100.0, 100.0)));
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = tokio::sync::mpsc::unbounded_channel();
        let worker = spawn_thread(
            ScopeConfig::default(),
            ManualTransport::default(),
            screen,
            tx,
            rx_cmd,
        );
        assert_eq!(next(&rx), ViewerEvent::Running(true));
        assert!(matches!(next(&rx), ViewerEvent::Log(_)));
        tx_cmd.send(ViewerCommand::Stop).unwrap();
        assert_eq!(next(&rx), ViewerEvent::Log("paused".to_owned()));
        assert_eq!(next(&rx), ViewerEvent::Running(false));
        tx_cmd.send(ViewerCommand::Start).unwrap();
        assert_eq!(next(&rx), ViewerEvent::Running(true));
        tx_cmd.send(ViewerCommand::Shutdown).unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn dropping_the_sender_ends_the_thread() {
        let screen = Arc::new(Mutex::new(RecordingScreen::new(100.0, 100.0)));
        let (tx, _rx) = channel();
        let (tx_cmd, rx_cmd) = tokio::sync::mpsc::unbounded_channel::<ViewerCommand>();
        let worker = spawn_thread(
            ScopeConfig::default(),
            ManualTransport::default(),
            screen,
            tx,
            rx_cmd,
        );
        drop(tx_cmd);
        worker.join().unwrap();
    }
}
