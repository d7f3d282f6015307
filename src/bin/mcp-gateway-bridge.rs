//! Gateway bridge — stdio-to-HTTP adapter for stdio-only MCP clients.
//!
//! Reads JSON-RPC messages from stdin, forwards them to the gateway's
//! `/mcp/{serverId}` endpoint, deframes the SSE-framed response, and writes
//! the JSON-RPC envelope to stdout.
//!
//! Usage:
//!   mcp-gateway-bridge --server-id <SERVER_ID> [--port <PORT>] [--roles <R1,R2>]

use mcp_gateway::access::ROLES_HEADER;
use mcp_gateway::sse;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

struct Args {
    port: u16,
    server_id: String,
    roles: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut port: u16 = 3001;
    let mut server_id: Option<String> = None;
    let mut roles: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                let val = args.next().ok_or("--port requires a value")?;
                port = val.parse().map_err(|_| format!("invalid port: {}", val))?;
            }
            "--server-id" => {
                server_id = Some(args.next().ok_or("--server-id requires a value")?);
            }
            "--roles" => {
                roles = Some(args.next().ok_or("--roles requires a value")?);
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    Ok(Args {
        port,
        server_id: server_id.ok_or("--server-id is required")?,
        roles,
    })
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("mcp-gateway-bridge: {}", e);
            eprintln!("Usage: mcp-gateway-bridge --server-id <ID> [--port <PORT>] [--roles <R1,R2>]");
            return std::process::ExitCode::from(1);
        }
    };

    let url = format!("http://127.0.0.1:{}/mcp/{}", args.port, args.server_id);
    let client = reqwest::Client::new();

    eprintln!("mcp-gateway-bridge: proxying stdio <-> {}", url);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if let Err(e) = handle_line(&client, &url, args.roles.as_deref(), &line, &mut stdout).await {
                            eprintln!("mcp-gateway-bridge: error: {}", e);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("mcp-gateway-bridge: stdin error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("mcp-gateway-bridge: interrupted");
                break;
            }
        }
    }

    std::process::ExitCode::SUCCESS
}

async fn handle_line(
    client: &reqwest::Client,
    url: &str,
    roles: Option<&str>,
    line: &str,
    stdout: &mut tokio::io::Stdout,
) -> Result<(), Box<dyn std::error::Error>> {
    let value: serde_json::Value = serde_json::from_str(line)?;

    let mut request = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(&value);
    if let Some(roles) = roles {
        request = request.header(ROLES_HEADER, roles);
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            // Gateway unreachable — return a JSON-RPC error if the request had an id
            if let Some(id) = value.get("id") {
                write_error(stdout, id, format!("gateway unreachable: {}", e)).await?;
            }
            return Ok(());
        }
    };

    let status = response.status();

    // 202 = notification acknowledged, no response expected
    if status.as_u16() == 202 {
        return Ok(());
    }

    if !status.is_success() {
        if let Some(id) = value.get("id") {
            let body = response.text().await.unwrap_or_default();
            write_error(stdout, id, format!("HTTP {}: {}", status.as_u16(), body)).await?;
        }
        return Ok(());
    }

    // The gateway frames /mcp/* responses as a single SSE event; unwrap it.
    let body = response.text().await?;
    let payload = match sse::last_data_payload(&body) {
        Ok(payload) => payload.to_string(),
        Err(_) => body,
    };

    stdout.write_all(payload.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;

    Ok(())
}

async fn write_error(
    stdout: &mut tokio::io::Stdout,
    id: &serde_json::Value,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let err = serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": -32603,
            "message": message
        }
    });
    let mut out = serde_json::to_vec(&err)?;
    out.push(b'\n');
    stdout.write_all(&out).await?;
    stdout.flush().await?;
    Ok(())
}
