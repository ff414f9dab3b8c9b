//! The brined server binary
//!
//! Configuration comes from a handful of environment variables read
//! here, at the outermost layer — the core itself only ever sees the
//! assembled [`ServerConfig`] struct.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | BRINE_BIND | 127.0.0.1:6379 | RESP listener address |
//! | BRINE_PASSWORD | (none) | AUTH password; unset disables auth |
//! | BRINE_MAX_MEMORY_MB | 64 | Shared engine memory budget |
//! | BRINE_AOF_PATH | (none) | Append-only log path; unset disables durability |
//! | BRINE_AOF_FSYNC | everysec | always, everysec, or no |
//! | BRINE_REPLICATION | async | none, async, or sync |
//! | RUST_LOG | info | tracing filter |
//!
//! Exit codes: 0 on clean shutdown, 1 on configuration failure.

use brinedb::{
    AofConfig, EngineConfig, FsyncPolicy, ProvisioningConfig, ReplicationConfig,
    ReplicationMode, RespServerConfig, Server, ServerConfig,
};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn config_from_env() -> Result<ServerConfig, String> {
    let bind_addr =
        std::env::var("BRINE_BIND").unwrap_or_else(|_| "127.0.0.1:6379".to_string());
    let password = std::env::var("BRINE_PASSWORD").ok().filter(|p| !p.is_empty());

    let max_memory_mb: u64 = match std::env::var("BRINE_MAX_MEMORY_MB") {
        Ok(raw) => raw
            .parse()
            .map_err(|_| format!("BRINE_MAX_MEMORY_MB is not a number: {}", raw))?,
        Err(_) => 64,
    };

    let aof = match std::env::var("BRINE_AOF_PATH") {
        Ok(path) if !path.is_empty() => {
            let fsync = match std::env::var("BRINE_AOF_FSYNC")
                .unwrap_or_else(|_| "everysec".to_string())
                .to_lowercase()
                .as_str()
            {
                "always" => FsyncPolicy::Always,
                "everysec" => FsyncPolicy::EverySec,
                "no" | "none" => FsyncPolicy::No,
                other => return Err(format!("unknown fsync policy: {}", other)),
            };
            let mut config = AofConfig::new(path);
            config.fsync = fsync;
            Some(config)
        }
        _ => None,
    };

    let replication_mode = match std::env::var("BRINE_REPLICATION")
        .unwrap_or_else(|_| "async".to_string())
        .to_lowercase()
        .as_str()
    {
        "none" => ReplicationMode::None,
        "async" => ReplicationMode::Async,
        "sync" => ReplicationMode::Sync,
        other => return Err(format!("unknown replication mode: {}", other)),
    };

    Ok(ServerConfig {
        resp: RespServerConfig {
            bind_addr,
            password,
            namespace: "default".to_string(),
        },
        provisioning: ProvisioningConfig {
            shared_engine: EngineConfig::with_max_memory(max_memory_mb * 1024 * 1024),
            ..ProvisioningConfig::default()
        },
        replication: ReplicationConfig {
            mode: replication_mode,
            ..ReplicationConfig::default()
        },
        aof,
        ..ServerConfig::default()
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match config_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration failure");
            return ExitCode::from(1);
        }
    };

    let server = match Server::start(config).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::from(1);
        }
    };

    info!("brined running, press Ctrl+C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "signal handler failed");
    }

    server.shutdown().await;
    ExitCode::SUCCESS
}
