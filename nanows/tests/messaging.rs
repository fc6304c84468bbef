//! Messaging integration tests
//!
//! Framing, reply correlation and listener delivery, driven through the
//! in-memory transport.

use bytes::Bytes;
use nanows::transport::{MemPeer, MemTransport};
use nanows::{
    CorrelationSeed, EventKind, NanoError, Notification, Payload, Protocol, ReplyMatching,
    SocketEvent, SocketOptions,
};
use nanows::Socket;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

const SEED: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

/// Let the connection pumps drain whatever the peers queued.
async fn settle() {
    compio::time::sleep(Duration::from_millis(10)).await;
}

async fn connected(
    options: SocketOptions,
    addresses: &[&str],
) -> nanows::Result<(Socket, MemTransport, Vec<MemPeer>)> {
    let transport = MemTransport::new().auto_accept();
    let socket = Socket::new(options, transport.clone());
    let mut peers = Vec::new();
    for address in addresses {
        socket.connect(*address).await?;
        peers.push(transport.last_peer(address).expect("peer created"));
    }
    Ok((socket, transport, peers))
}

fn collect_data(socket: &Socket) -> Rc<RefCell<Vec<Payload>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    socket.on_data(move |payload| sink.borrow_mut().push(payload.clone()));
    seen
}

#[compio::test]
async fn test_req_frames_carry_fixed_seed() -> nanows::Result<()> {
    let transport = MemTransport::new().auto_accept();
    let socket = Socket::with_seed(
        SocketOptions::new(Protocol::Req),
        transport.clone(),
        CorrelationSeed::from_bytes(SEED),
    );
    socket.connect("wss://rep").await?;
    let peer = transport.last_peer("wss://rep").unwrap();

    let _first = socket.send("hello")?;
    let second = socket.send("again")?.expect("REQ hands out replies");

    let sent = peer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], Payload::Binary(Bytes::from_static(b"\x92\x34\x56\x78hello")));
    assert_eq!(&sent[1].as_bytes()[..4], &sent[0].as_bytes()[..4]);

    // The header is stripped before the payload is surfaced.
    peer.deliver(Bytes::from_static(b"\x92\x34\x56\x78world"));
    let reply = second.await?;
    assert_eq!(reply, Payload::Text("world".into()));
    Ok(())
}

#[compio::test]
async fn test_req_binary_receive_mode() -> nanows::Result<()> {
    let options = SocketOptions::new(Protocol::Req).with_receive_binary(true);
    let (socket, _transport, peers) = connected(options, &["wss://rep"]).await?;
    assert!(peers[0].binary());

    let reply = socket.send("q")?.unwrap();
    peers[0].deliver(Bytes::from_static(&[0x80, 0, 0, 0, 0xff, 0x00]));
    assert_eq!(reply.await?, Payload::Binary(Bytes::from_static(&[0xff, 0x00])));
    Ok(())
}

#[compio::test]
async fn test_short_req_frame_yields_empty_payload() -> nanows::Result<()> {
    let (socket, _transport, peers) =
        connected(SocketOptions::new(Protocol::Req), &["wss://rep"]).await?;

    let reply = socket.send("q")?.unwrap();
    peers[0].deliver(Bytes::from_static(&[0x80, 0x01]));
    assert!(reply.await?.is_empty());
    Ok(())
}

#[compio::test]
async fn test_reply_from_any_connection() -> nanows::Result<()> {
    let (socket, _transport, peers) =
        connected(SocketOptions::new(Protocol::Pair), &["wss://a", "wss://b"]).await?;
    let seen = collect_data(&socket);

    let reply = socket.send("question")?.unwrap();
    for peer in &peers {
        assert_eq!(peer.sent(), vec![Payload::from("question")]);
    }

    peers[1].deliver("from b");
    assert_eq!(reply.await?, Payload::from("from b"));
    assert!(!socket.has_pending_request());

    // Later frames only reach the data listeners.
    peers[0].deliver("from a");
    settle().await;
    assert_eq!(*seen.borrow(), vec![Payload::from("from b"), Payload::from("from a")]);
    Ok(())
}

#[compio::test]
async fn test_new_send_abandons_pending_reply() -> nanows::Result<()> {
    let (socket, _transport, peers) =
        connected(SocketOptions::new(Protocol::Pair), &["wss://pair"]).await?;

    let first = socket.send("one")?.unwrap();
    let second = socket.send("two")?.unwrap();
    peers[0].deliver("answer");

    assert_eq!(second.await?, Payload::from("answer"));
    let abandoned = compio::time::timeout(Duration::from_millis(30), first.wait()).await;
    assert!(abandoned.is_err(), "abandoned reply must never resolve");
    Ok(())
}

#[compio::test]
async fn test_payloads_pass_through_unframed() -> nanows::Result<()> {
    for protocol in [Protocol::Pair, Protocol::Bus] {
        let (socket, _transport, peers) =
            connected(SocketOptions::new(protocol), &["wss://peer"]).await?;
        let seen = collect_data(&socket);

        socket.send("plain")?;
        socket.send(Bytes::from_static(b"\x00\x01"))?;
        assert_eq!(
            peers[0].sent(),
            vec![Payload::from("plain"), Payload::Binary(Bytes::from_static(b"\x00\x01"))]
        );

        peers[0].deliver("inbound");
        settle().await;
        assert_eq!(*seen.borrow(), vec![Payload::from("inbound")]);
    }
    Ok(())
}

#[compio::test]
async fn test_send_binary_converts_text() -> nanows::Result<()> {
    let options = SocketOptions::new(Protocol::Bus).with_send_binary(true);
    let (socket, _transport, peers) = connected(options, &["wss://bus"]).await?;

    assert!(socket.send("text")?.is_none());
    assert_eq!(peers[0].sent(), vec![Payload::Binary(Bytes::from_static(b"text"))]);
    Ok(())
}

#[compio::test]
async fn test_binary_frames_surface_as_text_by_default() -> nanows::Result<()> {
    let (socket, _transport, peers) =
        connected(SocketOptions::new(Protocol::Sub), &["wss://pub"]).await?;
    let seen = collect_data(&socket);

    peers[0].deliver(Bytes::from_static(b"news"));
    settle().await;
    assert_eq!(*seen.borrow(), vec![Payload::from("news")]);

    assert!(matches!(socket.send("nope"), Err(NanoError::Role(Protocol::Sub, _))));
    assert!(peers[0].sent().is_empty());
    Ok(())
}

#[compio::test]
async fn test_subprotocol_per_socket_type() -> nanows::Result<()> {
    let cases = [
        (Protocol::Req, "rep.sp.nanomsg.org"),
        (Protocol::Pair, "pair.sp.nanomsg.org"),
        (Protocol::Sub, "pub.sp.nanomsg.org"),
        (Protocol::Bus, "bus.sp.nanomsg.org"),
    ];
    for (protocol, expected) in cases {
        let (_socket, _transport, peers) =
            connected(SocketOptions::new(protocol), &["wss://x"]).await?;
        assert_eq!(peers[0].subprotocol(), expected);
    }
    Ok(())
}

#[compio::test]
async fn test_header_matching_skips_foreign_frames() -> nanows::Result<()> {
    let transport = MemTransport::new().auto_accept();
    let options = SocketOptions::new(Protocol::Req).with_reply_matching(ReplyMatching::Header);
    let socket = Socket::with_seed(options, transport.clone(), CorrelationSeed::from_bytes(SEED));
    socket.connect("wss://rep").await?;
    let peer = transport.last_peer("wss://rep").unwrap();
    let seen = collect_data(&socket);

    let reply = socket.send("q")?.unwrap();
    peer.deliver(Bytes::from_static(b"\x81\x00\x00\x00stray"));
    settle().await;
    assert!(socket.has_pending_request());

    peer.deliver(Bytes::from_static(b"\x92\x34\x56\x78mine"));
    assert_eq!(reply.await?, Payload::from("mine"));
    assert_eq!(*seen.borrow(), vec![Payload::from("stray"), Payload::from("mine")]);
    Ok(())
}

#[compio::test]
async fn test_request_timeout() -> nanows::Result<()> {
    let timeout = Duration::from_millis(20);
    let options = SocketOptions::new(Protocol::Req).with_request_timeout(timeout);
    let (socket, _transport, _peers) = connected(options, &["wss://rep"]).await?;

    let err = socket.request("anyone?").await.unwrap_err();
    assert!(matches!(err, NanoError::RequestTimeout(d) if d == timeout));
    Ok(())
}

#[compio::test]
async fn test_request_needs_correlating_protocol() -> nanows::Result<()> {
    let (socket, _transport, peers) =
        connected(SocketOptions::new(Protocol::Bus), &["wss://bus"]).await?;

    let err = socket.request("x").await.unwrap_err();
    assert!(matches!(err, NanoError::Role(Protocol::Bus, _)));
    assert!(peers[0].sent().is_empty());
    Ok(())
}

#[compio::test]
async fn test_send_from_data_listener() -> nanows::Result<()> {
    let (socket, _transport, peers) =
        connected(SocketOptions::new(Protocol::Bus), &["wss://bus"]).await?;

    let echo = socket.clone();
    socket.on_data(move |payload| {
        if payload.as_text() == Some("ping") {
            echo.send("pong").unwrap();
        }
    });

    peers[0].deliver("ping");
    settle().await;
    assert_eq!(peers[0].sent(), vec![Payload::from("pong")]);
    Ok(())
}

#[compio::test]
async fn test_send_drops_closing_connections() -> nanows::Result<()> {
    let (socket, _transport, peers) =
        connected(SocketOptions::new(Protocol::Bus), &["wss://a", "wss://b"]).await?;
    let monitor = socket.monitor();

    peers[0].begin_close();
    socket.send("survivors")?;

    assert!(!socket.is_registered("wss://a"));
    assert!(socket.is_registered("wss://b"));
    assert!(peers[0].sent().is_empty());
    assert_eq!(peers[1].sent(), vec![Payload::from("survivors")]);
    assert_eq!(monitor.try_recv().unwrap(), SocketEvent::Removed("wss://a".into()));
    Ok(())
}

#[compio::test]
async fn test_error_listener_sees_transport_errors() -> nanows::Result<()> {
    let (socket, _transport, peers) =
        connected(SocketOptions::new(Protocol::Pair), &["wss://pair"]).await?;

    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    socket.on(EventKind::Error, move |notification| {
        if let Notification::Error(err) = notification {
            sink.borrow_mut().push(err.to_string());
        }
    });

    peers[0].fail("handshake glitch");
    settle().await;
    assert_eq!(*errors.borrow(), vec!["handshake glitch".to_string()]);
    assert!(socket.is_registered("wss://pair"));
    Ok(())
}

#[compio::test]
async fn test_named_listeners() -> nanows::Result<()> {
    let (socket, _transport, peers) =
        connected(SocketOptions::new(Protocol::Pair), &["wss://pair"]).await?;

    let kinds = Rc::new(RefCell::new(Vec::new()));
    for name in ["data", "end", "error", "open"] {
        let sink = kinds.clone();
        socket.on_named(name, move |notification| sink.borrow_mut().push(notification.kind()));
    }

    peers[0].deliver("x");
    peers[0].fail("y");
    settle().await;
    assert_eq!(*kinds.borrow(), vec![EventKind::Data, EventKind::Error]);
    Ok(())
}
