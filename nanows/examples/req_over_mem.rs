//! Demonstration of a REQ socket talking to an in-memory REP peer.
//!
//! The peer echoes each request back with the correlation header intact,
//! which is what a nanomsg REP endpoint does. Run with
//! `RUST_LOG=nanows=debug` to see the socket lifecycle.

use nanows::prelude::*;
use std::time::Duration;

const ADDRESS: &str = "wss://rep.example/echo";

/// Answer every request the socket sent since `answered`.
fn serve(peer: &MemPeer, answered: &mut usize) {
    let sent = peer.sent();
    for request in &sent[*answered..] {
        let mut reply = request.as_bytes().to_vec();
        reply.extend_from_slice(b" (echoed)");
        peer.deliver(Bytes::from(reply));
    }
    *answered = sent.len();
}

#[compio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    nanows::dev_tracing::init_tracing();
    println!("=== REQ over in-memory transport ===\n");

    let transport = MemTransport::new().auto_accept();
    let options = SocketOptions::new(Protocol::Req)
        .with_debug(true)
        .with_reconnect_time(Duration::from_millis(50))
        .with_request_timeout(Duration::from_secs(1));
    let socket = Socket::new(options, transport.clone());
    let monitor = socket.monitor();

    socket.connect(ADDRESS).await?;
    println!("1. Connected, seed {:?}", socket.correlation_seed());

    let mut answered = 0;
    for i in 1..=3 {
        let reply = socket.send(format!("request #{i}"))?.ok_or("REQ always replies")?;
        let peer = transport.last_peer(ADDRESS).ok_or("no peer")?;
        serve(&peer, &mut answered);
        println!("2.{i} Reply: {}", reply.await?.to_text_lossy());
    }

    // Drop the connection from the far side and let the socket recover.
    transport.last_peer(ADDRESS).ok_or("no peer")?.drop_connection();
    compio::time::sleep(Duration::from_millis(120)).await;

    answered = 0;
    let reply = socket.send("after reconnect")?.ok_or("REQ always replies")?;
    serve(&transport.last_peer(ADDRESS).ok_or("no peer")?, &mut answered);
    println!("3. Reply: {}", reply.await?.to_text_lossy());

    socket.disconnect(ADDRESS);

    println!("\nLifecycle:");
    for event in monitor.try_iter() {
        println!("  - {event}");
    }

    Ok(())
}
