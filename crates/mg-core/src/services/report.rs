use crate::models::{ClientSettings, Enrichment, GatewayConfig};

use super::gateway::{StartupSummary, StatusReport, StopOutcome};
use super::publisher::sse_url;

const RULE_WIDTH: usize = 60;

fn client_command_line(client: &ClientSettings, url: &str) -> String {
    let mut parts = vec![client.command.clone()];
    parts.extend(client.args.iter().cloned());
    parts.push(format!("\"{url}\""));
    parts.extend(client.trailing_args.iter().cloned());
    parts.join(" ")
}

/// Lines under a ruled title, followed by a blank line.
fn section(lines: &mut Vec<String>, title: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    lines.push(rule.clone());
    lines.push(title.to_string());
    lines.push(rule);
    lines.push(String::new());
}

/// Connection instructions printed once startup completes.
pub fn render_instructions(summary: &StartupSummary, config: &GatewayConfig) -> String {
    let host = &summary.host;
    let mut lines = Vec::new();

    section(&mut lines, "MCP Gateway is running!");
    lines.push("Active servers:".to_string());
    for outcome in summary.running() {
        let warm = summary.warmups.iter().find(|w| w.name == outcome.name);
        let note = match warm {
            Some(w) if !w.ready => " (not reachable yet)".to_string(),
            Some(w) => match w.enrichment {
                Enrichment::Populated(count) => format!(" ({count} tools)"),
                _ => String::new(),
            },
            None => String::new(),
        };
        lines.push(format!("  - {}: port {}{note}", outcome.name, outcome.port));
    }
    lines.push(String::new());

    section(&mut lines, "Connecting from WSL/Linux:");
    lines.push("Option 1: register each server with the claude CLI".to_string());
    lines.push(String::new());
    for server in config.enabled_servers() {
        let url = sse_url(host, server.port);
        lines.push(format!(
            "  claude mcp add {} -s user -- {}",
            server.name,
            client_command_line(&config.gateway.client, &url)
        ));
    }
    lines.push(String::new());
    lines.push("Option 2: download .mcp.json".to_string());
    lines.push(String::new());
    lines.push(format!(
        "  curl http://{host}:{}/config.json > .mcp.json",
        summary.config_addr.port()
    ));
    lines.push(String::new());
    lines.push("Restart your MCP client after configuring.".to_string());
    lines.push(String::new());

    let rule = "=".repeat(RULE_WIDTH);
    lines.push(rule.clone());
    lines.push("Press Ctrl+C to stop".to_string());
    lines.push(rule);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn render_status(report: &StatusReport) -> String {
    match report {
        StatusReport::NotRunning => "MCP Gateway is not running\n".to_string(),
        StatusReport::Active {
            started, servers, ..
        } => {
            let mut out = format!("MCP Gateway status (started: {})\n", started.to_rfc3339());
            for server in servers {
                let state = if server.live { "running" } else { "stopped" };
                out.push_str(&format!("  - {}: {state} (port {})\n", server.name, server.port));
            }
            out
        }
    }
}

pub fn render_stop(outcome: &StopOutcome) -> String {
    match outcome {
        StopOutcome::NotRunning => "Gateway is not running".to_string(),
        StopOutcome::Signalled { pid } => format!("Sent stop signal to gateway (pid {pid})"),
        StopOutcome::ProcessGone { pid } => {
            format!("Gateway process {pid} not found, cleaned up")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use chrono::TimeZone;

    use crate::models::{ServerSpec, StartOutcome, StartStatus};
    use crate::services::gateway::ServerLiveness;
    use crate::services::readiness::WarmupReport;

    fn spec(name: &str, port: u16, enabled: bool) -> ServerSpec {
        ServerSpec {
            name: name.into(),
            command: "npx".into(),
            args: vec![],
            port,
            enabled,
            description: String::new(),
        }
    }

    fn outcome(name: &str, port: u16, status: StartStatus) -> StartOutcome {
        StartOutcome {
            name: name.into(),
            port,
            status,
            detail: None,
        }
    }

    #[test]
    fn instructions_text() {
        let config = GatewayConfig {
            servers: vec![
                spec("fs", 9001, true),
                spec("git", 9002, true),
                spec("off", 9003, false),
            ],
            gateway: Default::default(),
        };
        let summary = StartupSummary {
            outcomes: vec![
                outcome("fs", 9001, StartStatus::Running),
                outcome("git", 9002, StartStatus::Failed),
            ],
            warmups: vec![WarmupReport {
                name: "fs".into(),
                port: 9001,
                ready: true,
                attempts: 1,
                enrichment: Enrichment::Populated(3),
            }],
            host: "172.20.16.1".into(),
            config_addr: "0.0.0.0:8930".parse::<SocketAddr>().unwrap(),
        };
        insta::assert_snapshot!(render_instructions(&summary, &config), @r###"
        ============================================================
        MCP Gateway is running!
        ============================================================

        Active servers:
          - fs: port 9001 (3 tools)

        ============================================================
        Connecting from WSL/Linux:
        ============================================================

        Option 1: register each server with the claude CLI

          claude mcp add fs -s user -- npx -y mcp-remote "http://172.20.16.1:9001/sse" --allow-http
          claude mcp add git -s user -- npx -y mcp-remote "http://172.20.16.1:9002/sse" --allow-http

        Option 2: download .mcp.json

          curl http://172.20.16.1:8930/config.json > .mcp.json

        Restart your MCP client after configuring.

        ============================================================
        Press Ctrl+C to stop
        ============================================================
        "###);
    }

    #[test]
    fn status_lines_follow_probe_verdicts() {
        let report = StatusReport::Active {
            pid: 77,
            started: chrono::Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap(),
            servers: vec![
                ServerLiveness {
                    name: "fs".into(),
                    port: 9001,
                    live: true,
                },
                ServerLiveness {
                    name: "git".into(),
                    port: 9002,
                    live: false,
                },
            ],
        };
        insta::assert_snapshot!(render_status(&report), @r###"
        MCP Gateway status (started: 2026-10-17T09:30:00+00:00)
          - fs: running (port 9001)
          - git: stopped (port 9002)
        "###);
    }

    #[test]
    fn not_running_status() {
        assert_eq!(
            render_status(&StatusReport::NotRunning),
            "MCP Gateway is not running\n"
        );
    }

    #[test]
    fn stop_messages() {
        assert_eq!(render_stop(&StopOutcome::NotRunning), "Gateway is not running");
        assert!(render_stop(&StopOutcome::Signalled { pid: 12 }).contains("pid 12"));
        assert!(render_stop(&StopOutcome::ProcessGone { pid: 12 }).contains("cleaned up"));
    }

    #[test]
    fn instructions_with_nothing_running_end_in_one_newline() {
        let config = GatewayConfig {
            servers: vec![],
            gateway: Default::default(),
        };
        let summary = StartupSummary {
            outcomes: vec![],
            warmups: vec![],
            host: "localhost".into(),
            config_addr: "127.0.0.1:9930".parse::<SocketAddr>().unwrap(),
        };
        let text = render_instructions(&summary, &config);
        assert!(text.contains("Active servers:\n\n"));
        assert!(text.contains("curl http://localhost:9930/config.json"));
        assert!(text.ends_with("=\n"));
        assert!(!text.ends_with("\n\n"));
    }
}
