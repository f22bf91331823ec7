//! End-to-end commissioning over a real loopback TCP connection.
//!
//! The test plays the mesh root node: it sends beacons, reads back what the
//! server sends, and checks every frame on the wire.
//!
//! ```text
//! root node (test)                     server
//! ────────────────                     ──────
//! Beacon AA            ──────────►
//!                      ◄──────────     Install AA → 0
//! Beacon (corrupt)     ──────────►     dropped
//! Beacon BB            ──────────►
//!                      ◄──────────     Install BB → 1
//!                      ◄──────────     AmaInit
//!                      ◄──────────     Color (device 0 red), Color (cell green)
//!                      ◄──────────     Color (device 1 red), Color (cell green)
//!                      ◄──────────     AmaColor
//!                      ◄──────────     Color, Color, ...
//! ```

use std::net::SocketAddr;
use std::sync::{atomic::AtomicBool, Arc};
use std::time::Duration;

use pixelmesh_core::protocol::{color_frame_len, encode_control, CONTROL_FRAME_SIZE};
use pixelmesh_core::{decode_frame, Frame, FrameType, GridPosition, MacAddress, PixelGrid, Rgb};
use pixelmesh_server::application::{MeshState, SessionContext, SessionTiming, SharedGrid};
use pixelmesh_server::infrastructure::network::ConnectionListener;
use pixelmesh_server::infrastructure::operator::ScriptedOperator;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const IO_DEADLINE: Duration = Duration::from_secs(5);

async fn start_server(
    state: Arc<MeshState>,
    operator: ScriptedOperator,
    source: Arc<SharedGrid>,
) -> SocketAddr {
    let context = SessionContext {
        state,
        operator: Arc::new(operator),
        source,
        timing: SessionTiming {
            stream_interval: Duration::from_millis(10),
            ..SessionTiming::immediate()
        },
    };
    let bind_addr = "127.0.0.1:0".parse().unwrap();
    let listener = ConnectionListener::bind(bind_addr, context, Some(Duration::from_millis(100)))
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run(Arc::new(AtomicBool::new(true))));
    addr
}

async fn read_frame(stream: &mut TcpStream, len: usize) -> Frame {
    let mut buf = vec![0u8; len];
    timeout(IO_DEADLINE, stream.read_exact(&mut buf))
        .await
        .expect("frame arrived in time")
        .expect("read frame");
    decode_frame(&buf).expect("server frames are valid")
}

fn beacon(mac: [u8; 6]) -> Vec<u8> {
    encode_control(FrameType::Beacon, &mac).unwrap()
}

#[tokio::test]
async fn test_full_commissioning_then_streaming() {
    // Arrange: a 1x2 wall, the operator places AA right and BB left
    let state = Arc::new(MeshState::new(1, 2));
    let operator = ScriptedOperator::new()
        .with_discovery([true, false])
        .with_positions([GridPosition::new(0, 1), GridPosition::new(0, 0)]);
    let mut picture = PixelGrid::new(1, 2);
    picture.set(GridPosition::new(0, 0), Rgb::new(10, 20, 30)).unwrap();
    picture.set(GridPosition::new(0, 1), Rgb::new(40, 50, 60)).unwrap();
    let source = Arc::new(SharedGrid::new(picture));
    let addr = start_server(Arc::clone(&state), operator, source).await;
    let mut root = TcpStream::connect(addr).await.unwrap();

    // Act + Assert: discovery
    root.write_all(&beacon([0xAA; 6])).await.unwrap();
    let install = read_frame(&mut root, CONTROL_FRAME_SIZE).await;
    assert_eq!(install.frame_type, FrameType::Install);
    assert_eq!(install.mac(), Some(MacAddress([0xAA; 6])));
    assert_eq!(install.assigned_index(), Some(0));

    let mut corrupt = beacon([0xCC; 6]);
    corrupt[CONTROL_FRAME_SIZE - 1] ^= 0x20;
    root.write_all(&corrupt).await.unwrap();
    root.write_all(&beacon([0xBB; 6])).await.unwrap();
    let install = read_frame(&mut root, CONTROL_FRAME_SIZE).await;
    assert_eq!(install.mac(), Some(MacAddress([0xBB; 6])));
    assert_eq!(install.assigned_index(), Some(1));

    // Calibration
    let ama_init = read_frame(&mut root, CONTROL_FRAME_SIZE).await;
    assert_eq!(ama_init.frame_type, FrameType::AmaInit);

    let color_len = color_frame_len(2);
    let expected = [
        vec![[255, 0, 0], [0, 0, 0]],
        vec![[0, 255, 0], [0, 0, 0]],
        vec![[0, 0, 0], [255, 0, 0]],
        vec![[0, 0, 0], [0, 255, 0]],
    ];
    for pixels in expected {
        let frame = read_frame(&mut root, color_len).await;
        assert_eq!(frame.pixels().unwrap(), pixels);
    }

    let ama_color = read_frame(&mut root, CONTROL_FRAME_SIZE).await;
    assert_eq!(ama_color.frame_type, FrameType::AmaColor);

    // Streaming: AA sits at (0, 1), BB at (0, 0)
    let first = read_frame(&mut root, color_len).await;
    let second = read_frame(&mut root, color_len).await;
    assert_eq!(first.pixels().unwrap(), vec![[40, 50, 60], [10, 20, 30]]);
    assert_eq!(second.sequence().unwrap(), first.sequence().unwrap().wrapping_add(1));

    assert!(state.is_addressed());
    assert_eq!(state.registry().lock().await.size(), 2);
}

#[tokio::test]
async fn test_streaming_follows_picture_updates() {
    // Arrange: one node, already placed through calibration
    let state = Arc::new(MeshState::new(1, 1));
    let operator = ScriptedOperator::new()
        .with_discovery([false])
        .with_positions([GridPosition::new(0, 0)]);
    let source = Arc::new(SharedGrid::new(PixelGrid::new(1, 1)));
    let addr = start_server(state, operator, Arc::clone(&source)).await;
    let mut root = TcpStream::connect(addr).await.unwrap();

    root.write_all(&beacon([1, 2, 3, 4, 5, 6])).await.unwrap();
    read_frame(&mut root, CONTROL_FRAME_SIZE).await; // Install
    read_frame(&mut root, CONTROL_FRAME_SIZE).await; // AmaInit
    read_frame(&mut root, color_frame_len(1)).await; // highlight
    read_frame(&mut root, color_frame_len(1)).await; // confirm
    read_frame(&mut root, CONTROL_FRAME_SIZE).await; // AmaColor

    // Act
    source.update(PixelGrid::filled(1, 1, Rgb::WHITE));

    // Assert: the new picture shows up within a bounded number of frames
    let mut seen_white = false;
    for _ in 0..50 {
        let frame = read_frame(&mut root, color_frame_len(1)).await;
        if frame.pixels().unwrap() == vec![[255, 255, 255]] {
            seen_white = true;
            break;
        }
    }
    assert!(seen_white, "updated picture never reached the wire");
}

#[tokio::test]
async fn test_stray_byte_before_beacons_is_skipped() {
    // Arrange: a junk byte on the wire ahead of three beacons
    let state = Arc::new(MeshState::new(1, 3));
    let operator = ScriptedOperator::new().with_discovery([true, true, false]);
    let source = Arc::new(SharedGrid::new(PixelGrid::new(1, 3)));
    let addr = start_server(Arc::clone(&state), operator, source).await;
    let mut root = TcpStream::connect(addr).await.unwrap();
    let mut bytes = vec![0x00];
    for mac in [[1; 6], [2; 6], [3; 6]] {
        bytes.extend(beacon(mac));
    }

    // Act
    root.write_all(&bytes).await.unwrap();

    // Assert: every beacon is still answered, in order
    for (index, mac) in [[1; 6], [2; 6], [3; 6]].into_iter().enumerate() {
        let install = read_frame(&mut root, CONTROL_FRAME_SIZE).await;
        assert_eq!(install.frame_type, FrameType::Install);
        assert_eq!(install.mac(), Some(MacAddress(mac)));
        assert_eq!(install.assigned_index(), Some(index as u8));
    }
    assert_eq!(state.registry().lock().await.size(), 3);
}
