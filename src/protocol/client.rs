//! Server-list-ping client
//!
//! One call opens one TCP connection and runs the exchange strictly in order:
//! handshake, status request, status response, ping, pong. Every failure is
//! folded into [`StatusQueryResult::Offline`]; nothing here returns an error.

use super::codec::{decode_i64, decode_string, put_string, put_varint, Packet, PacketCodec};
use super::status::{parse_status_json, OfflineReason, StatusQueryResult};
use crate::common::net::{configure_tcp_stream, ServerAddress};
use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::debug;

/// Protocol version sent in the handshake. Servers answer status requests
/// for any version; 47 is the long-standing probe value.
pub const PROBE_PROTOCOL_VERSION: i32 = 47;

/// Handshake "next state" value selecting the status flow
const NEXT_STATE_STATUS: i32 = 1;

const HANDSHAKE_ID: i32 = 0x00;
const STATUS_REQUEST_ID: i32 = 0x00;
const STATUS_RESPONSE_ID: i32 = 0x00;
const PING_ID: i32 = 0x01;
const PONG_ID: i32 = 0x01;

/// Status client with fixed timeouts
#[derive(Debug, Clone, Copy)]
pub struct StatusClient {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl StatusClient {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        StatusClient {
            connect_timeout,
            read_timeout,
        }
    }

    pub async fn query(&self, address: &ServerAddress) -> StatusQueryResult {
        query_status(address, self.connect_timeout, self.read_timeout).await
    }
}

/// Query one server over a fresh connection
pub async fn query_status(
    address: &ServerAddress,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> StatusQueryResult {
    let stream = match connect(address, connect_timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!("[{}] connect failed: {}", address, e);
            return StatusQueryResult::offline(OfflineReason::ConnectFailure, e.to_string());
        }
    };

    let mut framed = Framed::new(stream, PacketCodec);
    let token: i64 = rand::random();
    let result = exchange(&mut framed, address, read_timeout, token).await;

    // Shut the socket down on every path.
    let _ = timeout(read_timeout, SinkExt::<Packet>::close(&mut framed)).await;

    match result {
        Ok(status) => {
            if let StatusQueryResult::Online(ref online) = status {
                debug!(
                    "[{}] online: {}/{} players, {:.1}ms",
                    address, online.players_online, online.players_max, online.latency_ms
                );
            }
            status
        }
        Err(e) => {
            let reason = OfflineReason::classify(&e);
            debug!("[{}] status query failed ({}): {}", address, reason, e);
            StatusQueryResult::offline(reason, e.to_string())
        }
    }
}

async fn connect(address: &ServerAddress, connect_timeout: Duration) -> Result<TcpStream> {
    let stream = timeout(connect_timeout, TcpStream::connect(address.connect_target()))
        .await
        .map_err(|_| {
            Error::connection(format!(
                "connecting to {} timed out after {:?}",
                address, connect_timeout
            ))
        })?
        .map_err(|e| Error::connection(format!("failed to connect to {}: {}", address, e)))?;

    configure_tcp_stream(&stream);
    Ok(stream)
}

/// Run the status exchange over an established stream.
///
/// A pong that does not echo `token` yields `Offline{PingMismatch}` rather
/// than an error: the server answered, but its timing cannot be trusted.
async fn exchange<S>(
    framed: &mut Framed<S, PacketCodec>,
    address: &ServerAddress,
    read_timeout: Duration,
    token: i64,
) -> Result<StatusQueryResult>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    step(read_timeout, "handshake", framed.feed(handshake_packet(address)?)).await?;
    step(
        read_timeout,
        "status request",
        framed.send(Packet::new(STATUS_REQUEST_ID, Bytes::new())),
    )
    .await?;

    let response = read_packet(framed, read_timeout, "status response").await?;
    if response.id != STATUS_RESPONSE_ID {
        return Err(Error::protocol(format!(
            "expected status response (0x00), got packet 0x{:02x}",
            response.id
        )));
    }
    let (json, _) = decode_string(&response.payload)?;
    let parsed = parse_status_json(&json)?;

    let ping_sent = Instant::now();
    step(
        read_timeout,
        "ping",
        framed.send(Packet::new(PING_ID, token.to_be_bytes().to_vec())),
    )
    .await?;

    let pong = read_packet(framed, read_timeout, "pong").await?;
    let latency = ping_sent.elapsed();
    if pong.id != PONG_ID {
        return Err(Error::protocol(format!(
            "expected pong (0x01), got packet 0x{:02x}",
            pong.id
        )));
    }

    let (echoed, _) = decode_i64(&pong.payload)?;
    if echoed != token {
        return Ok(StatusQueryResult::offline(
            OfflineReason::PingMismatch,
            format!("ping token {} was echoed as {}", token, echoed),
        ));
    }

    let latency_ms = latency.as_secs_f64() * 1000.0;
    Ok(StatusQueryResult::Online(
        parsed.into_online(latency_ms, json.into_bytes()),
    ))
}

fn handshake_packet(address: &ServerAddress) -> Result<Packet> {
    let mut payload = BytesMut::with_capacity(address.host.len() + 16);
    put_varint(&mut payload, PROBE_PROTOCOL_VERSION)?;
    put_string(&mut payload, &address.host)?;
    payload.put_u16(address.port);
    put_varint(&mut payload, NEXT_STATE_STATUS)?;
    Ok(Packet::new(HANDSHAKE_ID, payload.freeze()))
}

/// Bound a write step by the read timeout so a stalled peer cannot hang us
async fn step<F>(limit: Duration, what: &str, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    timeout(limit, fut)
        .await
        .map_err(|_| Error::timeout(format!("sending {} took longer than {:?}", what, limit)))?
}

async fn read_packet<S>(
    framed: &mut Framed<S, PacketCodec>,
    read_timeout: Duration,
    what: &str,
) -> Result<Packet>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(read_timeout, framed.next()).await {
        Err(_) => Err(Error::timeout(format!(
            "no {} within {:?}",
            what, read_timeout
        ))),
        Ok(None) => Err(Error::malformed(format!("connection closed before {}", what))),
        Ok(Some(packet)) => packet,
    }
}
