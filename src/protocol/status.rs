//! Status query outcomes and status-response parsing

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Why a status query did not produce an online result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineReason {
    ConnectFailure,
    Timeout,
    MalformedResponse,
    PingMismatch,
    Unknown,
}

impl OfflineReason {
    /// Map a failure from any probe step onto a reason
    pub fn classify(err: &Error) -> Self {
        match err {
            Error::Timeout(_) => OfflineReason::Timeout,
            Error::Connection(_) | Error::Dns(_) => OfflineReason::ConnectFailure,
            Error::MalformedData(_) | Error::Parse(_) | Error::Protocol(_) => {
                OfflineReason::MalformedResponse
            }
            Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => OfflineReason::Timeout,
            Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                OfflineReason::MalformedResponse
            }
            _ => OfflineReason::Unknown,
        }
    }
}

impl fmt::Display for OfflineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineReason::ConnectFailure => write!(f, "connection failed"),
            OfflineReason::Timeout => write!(f, "timed out"),
            OfflineReason::MalformedResponse => write!(f, "malformed response"),
            OfflineReason::PingMismatch => write!(f, "ping token mismatch"),
            OfflineReason::Unknown => write!(f, "unknown error"),
        }
    }
}

/// Fields reported by a server that answered the status query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnlineStatus {
    pub motd: String,
    pub players_online: u32,
    pub players_max: u32,
    pub latency_ms: f64,
    pub protocol_version: i32,
    pub version_name: Option<String>,
    /// The status JSON exactly as received
    #[serde(skip)]
    pub raw_payload: Vec<u8>,
}

/// Outcome of one status query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatusQueryResult {
    Online(OnlineStatus),
    Offline { reason: OfflineReason, detail: String },
}

impl StatusQueryResult {
    pub fn offline(reason: OfflineReason, detail: impl Into<String>) -> Self {
        StatusQueryResult::Offline {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, StatusQueryResult::Online(_))
    }

    pub fn offline_reason(&self) -> Option<OfflineReason> {
        match self {
            StatusQueryResult::Offline { reason, .. } => Some(*reason),
            StatusQueryResult::Online(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    description: Option<Value>,
    players: Option<RawPlayers>,
    version: Option<RawVersion>,
}

#[derive(Debug, Deserialize)]
struct RawPlayers {
    online: Option<i64>,
    max: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawVersion {
    name: Option<String>,
    protocol: Option<i64>,
}

/// Status response fields, before latency is known
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatus {
    pub motd: String,
    pub players_online: u32,
    pub players_max: u32,
    pub protocol_version: i32,
    pub version_name: Option<String>,
}

impl ParsedStatus {
    pub fn into_online(self, latency_ms: f64, raw_payload: Vec<u8>) -> OnlineStatus {
        OnlineStatus {
            motd: self.motd,
            players_online: self.players_online,
            players_max: self.players_max,
            latency_ms,
            protocol_version: self.protocol_version,
            version_name: self.version_name,
            raw_payload,
        }
    }
}

/// Parse the JSON document carried by a status response
pub fn parse_status_json(json: &str) -> Result<ParsedStatus> {
    let raw: RawStatus = serde_json::from_str(json)?;

    let description = raw
        .description
        .ok_or_else(|| Error::parse("status is missing 'description'"))?;
    let players = raw
        .players
        .ok_or_else(|| Error::parse("status is missing 'players'"))?;
    let version = raw
        .version
        .ok_or_else(|| Error::parse("status is missing 'version'"))?;

    let players_online = non_negative(players.online, "players.online")?;
    let players_max = non_negative(players.max, "players.max")?;
    let protocol_version = version
        .protocol
        .ok_or_else(|| Error::parse("status is missing 'version.protocol'"))
        .and_then(|p| {
            i32::try_from(p).map_err(|_| Error::parse(format!("version.protocol {} out of range", p)))
        })?;

    Ok(ParsedStatus {
        motd: flatten_motd(&description),
        players_online,
        players_max,
        protocol_version,
        version_name: version.name.filter(|n| !n.is_empty()),
    })
}

fn non_negative(value: Option<i64>, field: &str) -> Result<u32> {
    let value = value.ok_or_else(|| Error::parse(format!("status is missing '{}'", field)))?;
    u32::try_from(value).map_err(|_| Error::parse(format!("{} = {} is out of range", field, value)))
}

/// Flatten a description (plain string, chat component, or component list)
/// into plain text with legacy `§` formatting codes removed.
pub fn flatten_motd(description: &Value) -> String {
    let mut out = String::new();
    collect_text(description, &mut out);
    strip_formatting(&out).trim().to_string()
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(parts) => parts.iter().for_each(|p| collect_text(p, out)),
        Value::Object(map) => {
            if let Some(text) = map.get("text") {
                collect_text(text, out);
            } else if let Some(Value::String(key)) = map.get("translate") {
                out.push_str(key);
            }
            if let Some(extra) = map.get("extra") {
                collect_text(extra, out);
            }
        }
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(_) | Value::Null => {}
    }
}

fn strip_formatting(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const VANILLA: &str = r#"{
        "version": {"name": "1.20.4", "protocol": 765},
        "players": {"max": 100, "online": 5, "sample": [{"name": "steve", "id": "x"}]},
        "description": {"text": "Hello world"},
        "enforcesSecureChat": true
    }"#;

    #[test]
    fn test_parse_vanilla_status() {
        let status = parse_status_json(VANILLA).unwrap();
        assert_eq!(status.motd, "Hello world");
        assert_eq!(status.players_online, 5);
        assert_eq!(status.players_max, 100);
        assert_eq!(status.protocol_version, 765);
        assert_eq!(status.version_name.as_deref(), Some("1.20.4"));
    }

    #[test]
    fn test_plain_string_description() {
        let json = r#"{"version":{"protocol":47},"players":{"max":20,"online":0},"description":"§6Gold §rserver"}"#;
        let status = parse_status_json(json).unwrap();
        assert_eq!(status.motd, "Gold server");
        assert!(status.version_name.is_none());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let cases = [
            r#"{"players":{"max":1,"online":0},"version":{"protocol":1}}"#,
            r#"{"description":"x","version":{"protocol":1}}"#,
            r#"{"description":"x","players":{"max":1,"online":0}}"#,
            r#"{"description":"x","players":{"max":1},"version":{"protocol":1}}"#,
            r#"{"description":"x","players":{"max":1,"online":0},"version":{"name":"a"}}"#,
            r#"{"description":"x","players":{"max":1,"online":-3},"version":{"protocol":1}}"#,
            "not json",
        ];
        for case in cases {
            assert!(matches!(parse_status_json(case), Err(Error::Parse(_))), "{}", case);
        }
    }

    #[test]
    fn test_flatten_nested_components() {
        let description = json!({
            "text": "",
            "extra": [
                {"text": "§lBig ", "bold": true},
                {"text": "Network", "extra": [{"text": " | "}, "1.8-1.20"]},
            ]
        });
        assert_eq!(flatten_motd(&description), "Big Network | 1.8-1.20");
    }

    #[test]
    fn test_flatten_component_array() {
        let description = json!([{"text": "A"}, {"translate": "multiplayer.status.unknown"}]);
        assert_eq!(flatten_motd(&description), "Amultiplayer.status.unknown");
    }

    #[test]
    fn test_classify_errors() {
        assert_eq!(OfflineReason::classify(&Error::timeout("read")), OfflineReason::Timeout);
        assert_eq!(
            OfflineReason::classify(&Error::connection("refused")),
            OfflineReason::ConnectFailure
        );
        assert_eq!(
            OfflineReason::classify(&Error::malformed("varint")),
            OfflineReason::MalformedResponse
        );
        assert_eq!(
            OfflineReason::classify(&Error::internal("boom")),
            OfflineReason::Unknown
        );
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(
            OfflineReason::classify(&Error::Io(eof)),
            OfflineReason::MalformedResponse
        );
    }

    #[test]
    fn test_offline_serializes_tagged() {
        let result = StatusQueryResult::offline(OfflineReason::PingMismatch, "token 1 != 2");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["state"], "offline");
        assert_eq!(value["reason"], "ping_mismatch");
        assert_eq!(value["detail"], "token 1 != 2");
    }
}
