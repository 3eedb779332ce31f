use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use crate::feed::codec::{decode_body, decode_header, HEADER_LEN};
use crate::feed::generator::unix_seconds;
use crate::feed::store::{BatchStore, FeedBatch};
use crate::scope::ScopeError;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Reads device packets until the stream ends and pushes each one into the
/// store. `query2` is stamped as soon as a packet's body has arrived.
/// Returns how many packets were stored.
pub async fn pump<R: AsyncRead + Unpin>(
    reader: &mut R,
    channels: usize,
    store: &RwLock<BatchStore>,
) -> Result<u64, ScopeError> {
    let mut received = 0;
    let mut header = [0u8; HEADER_LEN];
    loop {
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(received),
            Err(e) => return Err(e.into()),
        }
        let head = decode_header(&header)?;
        let mut body = vec![0u8; usize::from(head.k)];
        reader.read_exact(&mut body).await?;
        let query2 = unix_seconds();
        let data = decode_body(&body, channels)?;
        store.write().await.push(FeedBatch {
            idx: u64::from(head.n),
            query: head.q,
            query2,
            data,
        });
        received += 1;
    }
}

/// Connects to the device once and stores packets until it hangs up.
pub async fn receive(
    addr: &str,
    channels: usize,
    store: &RwLock<BatchStore>,
) -> Result<u64, ScopeError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| ScopeError::Connection(format!("device at {addr}: {e}")))?;
    log::info!("connected to device at {addr}");
    pump(&mut stream, channels, store).await
}

/// Keeps a device connection alive, reconnecting after every failure.
pub async fn receive_forever(addr: String, channels: usize, store: &RwLock<BatchStore>) {
    loop {
        match receive(&addr, channels, store).await {
            Ok(count) => log::warn!("device closed the stream after {count} packets"),
            Err(e) => log::warn!("device link: {e}"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::codec::encode_packet;
    use crate::scope::Column;

    fn store() -> RwLock<BatchStore> {
        RwLock::new(BatchStore::new(10).unwrap())
    }

    #[tokio::test]
    async fn packets_become_batches_stamped_on_receipt() {
        let mut wire = encode_packet(41, 100.0, &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        wire.extend(encode_packet(42, 100.5, &[vec![5.0, 6.0]]).unwrap());
        let store = store();
        let before = unix_seconds();
        let count = pump(&mut wire.as_slice(), 2, &store).await.unwrap();
        assert_eq!(count, 2);

        let store = store.read().await;
        assert_eq!(store.len(), 2);
        let newest = store.newest().unwrap();
        assert_eq!(newest.idx, 42);
        assert_eq!(newest.query, 100.5);
        assert_eq!(newest.data, vec![vec![5.0, 6.0]]);
        assert!(newest.query2 >= before);
        match store.latest(2).data {
            Column::Indexed(map) => {
                assert_eq!(map["0"], vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
            }
            Column::Rows(_) => panic!("expected index-keyed column"),
        }
    }

    #[tokio::test]
    async fn corrupt_or_truncated_streams_fail() {
        let mut bad_magic = encode_packet(1, 1.0, &[vec![1.0]]).unwrap();
        bad_magic[0] = b'x';
        let err = pump(&mut bad_magic.as_slice(), 1, &store()).await.unwrap_err();
        assert!(matches!(err, ScopeError::Packet(_)), "{err}");

        let packet = encode_packet(1, 1.0, &[vec![1.0, 2.0]]).unwrap();
        let truncated = &packet[..packet.len() - 2];
        let err = pump(&mut &truncated[..], 2, &store()).await.unwrap_err();
        assert!(matches!(err, ScopeError::Io(_)), "{err}");

        // 2 samples cannot be split into 3-channel frames
        let err = pump(&mut packet.as_slice(), 3, &store()).await.unwrap_err();
        assert!(matches!(err, ScopeError::Packet(_)), "{err}");
    }

    #[tokio::test]
    async fn unreachable_device_is_a_connection_error() {
        let err = receive("127.0.0.1:1", 1, &store()).await.unwrap_err();
        assert!(err.is_connection(), "{err}");
    }
}
