//! Broker behavior exercised over the raw wire protocol.

use rill_core::transport::{FrameReader, FrameWriter, Transport};
use rill_harness::{Broker, MemTransport};
use rill_proto::{Payload, payloads};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

type Writer = FrameWriter<WriteHalf<DuplexStream>>;
type Reader = FrameReader<ReadHalf<DuplexStream>>;

const KEYS: [&str; 3] = ["read-key", "write-key", "admin-key"];

async fn handshake(
    transport: &MemTransport,
    session_id: Option<String>,
) -> (Writer, Reader, payloads::HandshakeOk) {
    let (send, recv) = transport.open().await.unwrap();
    let mut writer = FrameWriter::new(send);
    let mut reader = FrameReader::new(recv);

    let hello = Payload::Handshake(payloads::Handshake {
        keys: KEYS.map(str::to_owned).to_vec(),
        session_id,
    });
    writer.write_frame(&hello.into_frame(0).unwrap()).await.unwrap();

    let frame = reader.read_frame().await.unwrap().unwrap();
    match Payload::from_frame(&frame).unwrap() {
        Payload::HandshakeOk(ok) => (writer, reader, ok),
        other => panic!("expected handshake ok, got {other:?}"),
    }
}

async fn request(
    writer: &mut Writer,
    reader: &mut Reader,
    payload: Payload,
    correlation_id: u64,
) -> Payload {
    writer.write_frame(&payload.into_frame(correlation_id).unwrap()).await.unwrap();
    loop {
        let frame = reader.read_frame().await.unwrap().unwrap();
        if frame.header.correlation_id() == correlation_id {
            return Payload::from_frame(&frame).unwrap();
        }
    }
}

fn subscribe(channel: &str) -> Payload {
    Payload::Subscribe(payloads::ChannelRequest { channel: channel.to_owned() })
}

#[tokio::test]
async fn handshake_issues_fresh_session() {
    let (_broker, transport) = Broker::start();
    let (_writer, _reader, ok) = handshake(&transport, None).await;
    assert!(!ok.restored);
    assert!(!ok.session_id.is_empty());
}

#[tokio::test]
async fn subscribe_then_publish_delivers() {
    let (_broker, transport) = Broker::start();
    let (mut writer, mut reader, _ok) = handshake(&transport, None).await;

    let response = request(&mut writer, &mut reader, subscribe("news"), 1).await;
    assert_eq!(
        response,
        Payload::ChannelList(payloads::ChannelList { channels: vec!["news".into()] })
    );

    // Publish from a second connection with a receipt.
    let (mut writer2, mut reader2, _ok2) = handshake(&transport, None).await;
    let publish = Payload::Publish(payloads::Publish {
        channel: "news".into(),
        message: "hello".into(),
        requires_ack: true,
    });
    let Payload::PublishReceipt(receipt) = request(&mut writer2, &mut reader2, publish, 1).await
    else {
        panic!("expected a publish receipt")
    };

    let frame = reader.read_frame().await.unwrap().unwrap();
    let Payload::Message(message) = Payload::from_frame(&frame).unwrap() else {
        panic!("expected a delivered message")
    };
    assert_eq!(message.channel, "news");
    assert_eq!(message.message, "hello");
    assert_eq!(message.message_id, receipt.message_id);
}

#[tokio::test]
async fn reconnect_restores_session_channels() {
    let (_broker, transport) = Broker::start();

    let (mut writer, mut reader, ok) = handshake(&transport, None).await;
    request(&mut writer, &mut reader, subscribe("news"), 1).await;
    drop((writer, reader));

    let (mut writer, mut reader, restored) =
        handshake(&transport, Some(ok.session_id.clone())).await;
    assert!(restored.restored);
    assert_eq!(restored.session_id, ok.session_id);

    let list = request(&mut writer, &mut reader, Payload::ListSubscriptions, 1).await;
    assert_eq!(
        list,
        Payload::ChannelList(payloads::ChannelList { channels: vec!["news".into()] })
    );
}

#[tokio::test]
async fn unsubscribe_unknown_channel_is_an_error() {
    let (_broker, transport) = Broker::start();
    let (mut writer, mut reader, _ok) = handshake(&transport, None).await;

    let unsubscribe =
        Payload::Unsubscribe(payloads::ChannelRequest { channel: "ghost".into() });
    let Payload::Error(info) = request(&mut writer, &mut reader, unsubscribe, 4).await else {
        panic!("expected an error response")
    };
    assert_eq!(info.code, payloads::ErrorCode::NotSubscribed);
}

#[tokio::test]
async fn rejected_handshake_gets_error_frame() {
    let (broker, transport) = Broker::start();
    broker.reject_handshake(true);

    let (send, recv) = transport.open().await.unwrap();
    let mut writer = FrameWriter::new(send);
    let mut reader = FrameReader::new(recv);
    let hello = Payload::Handshake(payloads::Handshake {
        keys: KEYS.map(str::to_owned).to_vec(),
        session_id: None,
    });
    writer.write_frame(&hello.into_frame(0).unwrap()).await.unwrap();

    let frame = reader.read_frame().await.unwrap().unwrap();
    let Payload::Error(info) = Payload::from_frame(&frame).unwrap() else {
        panic!("expected an error response")
    };
    assert_eq!(info.code, payloads::ErrorCode::Unauthorized);
}

#[tokio::test]
async fn delivery_acks_are_recorded() {
    let (broker, transport) = Broker::start();
    let (mut writer, mut reader, _ok) = handshake(&transport, None).await;
    request(&mut writer, &mut reader, subscribe("news"), 1).await;

    let message_id = broker.push("news", "urgent", true);
    let frame = reader.read_frame().await.unwrap().unwrap();
    let Payload::Message(message) = Payload::from_frame(&frame).unwrap() else {
        panic!("expected a delivered message")
    };
    assert!(message.requires_ack);

    let ack = Payload::Ack(payloads::Ack { message_id: message.message_id });
    writer.write_frame(&ack.into_frame(0).unwrap()).await.unwrap();

    // The ack travels one direction only; poll until recorded.
    loop {
        if broker.acks() == vec![message_id.clone()] {
            break;
        }
        tokio::task::yield_now().await;
    }
}
