//! Java-edition status protocol: wire codec, status model and client

pub mod client;
pub mod codec;
pub mod status;

pub use client::{query_status, StatusClient, PROBE_PROTOCOL_VERSION};
pub use codec::{
    decode_packet, decode_string, decode_varint, encode_packet, encode_string, encode_varint,
    Packet, PacketCodec,
};
pub use status::{flatten_motd, parse_status_json, OfflineReason, OnlineStatus, StatusQueryResult};
