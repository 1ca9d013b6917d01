//! Fake Minecraft status server for local testing
//!
//! Answers handshake, status request and ping like a real Java-edition
//! server. With `--bad-pong` the pong carries a different token.
//!
//! Usage: cargo run --bin fake_status_server -- [port] [--motd <text>] [--players <online>/<max>] [--bad-pong]

use std::env;

use bytes::{BufMut, BytesMut};
use futures::{SinkExt, StreamExt};
use mc_server_finder::protocol::codec::{decode_i64, put_string, Packet, PacketCodec};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

struct Options {
    port: u16,
    motd: String,
    online: u32,
    max: u32,
    bad_pong: bool,
}

fn parse_args() -> Options {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let mut opts = Options {
        port: 25565,
        motd: "A fake Minecraft server".to_string(),
        online: 7,
        max: 100,
        bad_pong: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--motd" if i + 1 < args.len() => {
                opts.motd = args[i + 1].clone();
                i += 1;
            }
            "--players" if i + 1 < args.len() => {
                if let Some((online, max)) = args[i + 1].split_once('/') {
                    opts.online = online.parse().unwrap_or(opts.online);
                    opts.max = max.parse().unwrap_or(opts.max);
                }
                i += 1;
            }
            "--bad-pong" => opts.bad_pong = true,
            other => {
                if let Ok(port) = other.parse() {
                    opts.port = port;
                }
            }
        }
        i += 1;
    }
    opts
}

fn status_json(opts: &Options) -> String {
    json!({
        "version": { "name": "1.20.4", "protocol": 765 },
        "players": { "max": opts.max, "online": opts.online, "sample": [] },
        "description": { "text": opts.motd }
    })
    .to_string()
}

async fn handle_client(stream: TcpStream, status: String, bad_pong: bool) -> mc_server_finder::Result<()> {
    let mut framed = Framed::new(stream, PacketCodec);

    // Handshake, then the empty status request
    let Some(handshake) = framed.next().await.transpose()? else {
        return Ok(());
    };
    if handshake.id != 0x00 {
        return Ok(());
    }
    let Some(_request) = framed.next().await.transpose()? else {
        return Ok(());
    };

    let mut payload = BytesMut::new();
    put_string(&mut payload, &status)?;
    framed.send(Packet::new(0x00, payload.freeze())).await?;

    let Some(ping) = framed.next().await.transpose()? else {
        return Ok(());
    };
    let (token, _) = decode_i64(&ping.payload)?;
    let token = if bad_pong { token.wrapping_add(1) } else { token };

    let mut pong = BytesMut::with_capacity(8);
    pong.put_i64(token);
    framed.send(Packet::new(0x01, pong.freeze())).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let opts = parse_args();
    let listener = TcpListener::bind(("0.0.0.0", opts.port)).await?;
    println!("fake status server listening on {}", listener.local_addr()?);
    if opts.bad_pong {
        println!("pong tokens will not match");
    }

    loop {
        let (stream, peer) = listener.accept().await?;
        let status = status_json(&opts);
        let bad_pong = opts.bad_pong;
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, status, bad_pong).await {
                eprintln!("[{}] {}", peer, e);
            }
        });
    }
}
