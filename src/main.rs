use std::path::PathBuf;

struct Args {
    config_path: PathBuf,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let val = args.next().ok_or("--config requires a value")?;
                config_path = Some(PathBuf::from(val));
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    let config_path = config_path
        .or_else(|| std::env::var_os("MCP_GATEWAY_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.json"));

    Ok(Args { config_path })
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    mcp_gateway::init_tracing();

    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("mcp-gateway: {}", e);
            eprintln!("Usage: mcp-gateway [--config <PATH>]");
            return std::process::ExitCode::from(1);
        }
    };

    if let Err(e) = mcp_gateway::run(args.config_path).await {
        tracing::error!("Gateway error: {:#}", e);
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::SUCCESS
}
