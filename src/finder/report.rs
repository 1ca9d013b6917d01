//! Fallback report and its text rendering

use crate::common::net::ServerAddress;
use crate::discovery::SuggestionBlock;
use crate::protocol::StatusQueryResult;
use serde::Serialize;
use std::fmt;

/// The only value handed back across the tool boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackReport {
    address: ServerAddress,
    srv_target: Option<ServerAddress>,
    outcome: StatusQueryResult,
    suggestions: Option<SuggestionBlock>,
}

impl FallbackReport {
    pub fn online(address: ServerAddress, srv_target: Option<ServerAddress>, outcome: StatusQueryResult) -> Self {
        FallbackReport {
            address,
            srv_target,
            outcome,
            suggestions: None,
        }
    }

    pub fn offline(
        address: ServerAddress,
        srv_target: Option<ServerAddress>,
        outcome: StatusQueryResult,
        suggestions: SuggestionBlock,
    ) -> Self {
        FallbackReport {
            address,
            srv_target,
            outcome,
            suggestions: Some(suggestions),
        }
    }

    /// Address as requested by the caller
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// Address actually probed when an SRV record redirected the query
    pub fn srv_target(&self) -> Option<&ServerAddress> {
        self.srv_target.as_ref()
    }

    pub fn outcome(&self) -> &StatusQueryResult {
        &self.outcome
    }

    pub fn suggestions(&self) -> Option<&SuggestionBlock> {
        self.suggestions.as_ref()
    }
}

impl fmt::Display for FallbackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            StatusQueryResult::Online(status) => {
                writeln!(f, "🎮 **Minecraft Server Status**")?;
                writeln!(f, "🖥 Server: `{}`", self.address)?;
                if let Some(target) = &self.srv_target {
                    writeln!(f, "🔀 Resolved via SRV: `{}`", target)?;
                }
                writeln!(f, "✅ **Online**")?;
                writeln!(f, "👥 Players: {}/{}", status.players_online, status.players_max)?;
                let motd = if status.motd.is_empty() { "(none)" } else { &status.motd };
                writeln!(f, "📢 MOTD: {}", motd)?;
                if let Some(name) = &status.version_name {
                    writeln!(f, "🧩 Version: {} (protocol {})", name, status.protocol_version)?;
                }
                write!(f, "⏱ Latency: {:.1} ms", status.latency_ms)
            }
            StatusQueryResult::Offline { reason, detail } => {
                writeln!(
                    f,
                    "❌ The server `{}` appears to be **offline** ({}).",
                    self.address, reason
                )?;
                if !detail.is_empty() {
                    writeln!(f, "Details: {}", detail)?;
                }
                if let Some(block) = &self.suggestions {
                    writeln!(f)?;
                    writeln!(f, "💡 **Here are some alternative servers** ({}):", block.source_kind)?;
                    write!(f, "{}", block.text)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SourceKind;
    use crate::protocol::{OfflineReason, OnlineStatus};

    fn addr() -> ServerAddress {
        ServerAddress::new("play.example.com", None).unwrap()
    }

    #[test]
    fn test_render_online() {
        let report = FallbackReport::online(
            addr(),
            None,
            StatusQueryResult::Online(OnlineStatus {
                motd: "Welcome".to_string(),
                players_online: 12,
                players_max: 200,
                latency_ms: 42.26,
                protocol_version: 765,
                version_name: Some("1.20.4".to_string()),
                raw_payload: Vec::new(),
            }),
        );
        let text = report.to_string();
        assert!(text.contains("`play.example.com:25565`"));
        assert!(text.contains("**Online**"));
        assert!(text.contains("Players: 12/200"));
        assert!(text.contains("MOTD: Welcome"));
        assert!(text.contains("Version: 1.20.4 (protocol 765)"));
        assert!(text.ends_with("Latency: 42.3 ms"));
        assert!(report.suggestions().is_none());
    }

    #[test]
    fn test_render_offline_with_suggestions() {
        let report = FallbackReport::offline(
            addr(),
            Some(ServerAddress::new("node1.example.com", Some(25600)).unwrap()),
            StatusQueryResult::offline(OfflineReason::ConnectFailure, "connection refused"),
            SuggestionBlock::new(SourceKind::Search, "- https://minecraftservers.org/"),
        );
        let text = report.to_string();
        assert!(text.starts_with("❌ The server `play.example.com:25565` appears to be **offline** (connection failed)."));
        assert!(text.contains("Details: connection refused"));
        assert!(text.contains("(web search):\n- https://minecraftservers.org/"));
        assert_eq!(report.srv_target().unwrap().port, 25600);
    }

    #[test]
    fn test_report_serializes() {
        let report = FallbackReport::offline(
            addr(),
            None,
            StatusQueryResult::offline(OfflineReason::Timeout, ""),
            SuggestionBlock::new(SourceKind::Completion, "Hypixel - mc.hypixel.net"),
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["address"]["port"], 25565);
        assert_eq!(value["outcome"]["reason"], "timeout");
        assert_eq!(value["suggestions"]["source_kind"], "completion");
    }
}
