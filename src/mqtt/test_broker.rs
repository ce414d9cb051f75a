//! Minimal in-process MQTT 3.1.1 broker for tests: accepts one client,
//! answers its CONNECT with a fixed CONNACK and records every later frame
//! until the client closes the socket.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub(crate) const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
pub(crate) const DISCONNECT: [u8; 2] = [0xe0, 0x00];

pub(crate) struct FakeBroker {
    pub(crate) port: u16,
    session: JoinHandle<Vec<Vec<u8>>>,
}

impl FakeBroker {
    pub(crate) async fn start(connack: [u8; 4]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let session = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let connect = read_frame(&mut stream).await.expect("client sent no CONNECT");
            assert_eq!(connect[0], 0x10, "first frame must be CONNECT");
            stream.write_all(&connack).await.unwrap();

            let mut frames = Vec::new();
            while let Some(frame) = read_frame(&mut stream).await {
                frames.push(frame);
            }
            frames
        });

        Self { port, session }
    }

    /// Frames received after CONNECT, once the client has hung up.
    pub(crate) async fn received(self) -> Vec<Vec<u8>> {
        tokio::time::timeout(Duration::from_secs(5), self.session)
            .await
            .expect("client never closed the connection")
            .unwrap()
    }
}

/// QoS 0 PUBLISH frame as rumqttc writes it (short topic and payload only).
pub(crate) fn publish_frame(topic: &str, payload: &str) -> Vec<u8> {
    let remaining = 2 + topic.len() + payload.len();
    assert!(remaining < 128);

    let mut frame = vec![0x30, remaining as u8, 0x00, topic.len() as u8];
    frame.extend_from_slice(topic.as_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame
}

async fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut frame = vec![stream.read_u8().await.ok()?];

    let mut remaining = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.ok()?;
        frame.push(byte);
        remaining |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let start = frame.len();
    frame.resize(start + remaining, 0);
    stream.read_exact(&mut frame[start..]).await.ok()?;
    Some(frame)
}
