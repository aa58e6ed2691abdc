use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use aika_bridge::{AikaConfig, CONFIG_FILE, ConfigLoader, LineBridgeFactory, TokenCacheProvider};
use aika_core::session::{DEFAULT_PORT, Endpoint, SessionManager};
use aika_core::{AttemptFailure, AuthError, Companion, ConnectionError, RunOutcome, lines};

#[derive(Debug, Clone, PartialEq)]
struct Args {
    host: String,
    port: u16,
    retries: Option<u32>,
    config: Option<PathBuf>,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "aika\n\n\
USAGE:\n  aika <host> [port] [--retries N] [--config PATH]\n\n\
ENV:\n  AIKA_CONFIG_DIR     directory searched for {CONFIG_FILE}\n  AIKA_BOT_NAME       bot name (default Aika)\n  AIKA_BRIDGE_ADDR    protocol bridge address (default 127.0.0.1:19180)\n  AIKA_SESSION_TOKEN  session token\n  AIKA_TOKEN_FILE     JSON token cache\n  RUST_LOG            log filter (default info)\n"
    );
    std::process::exit(2);
}

fn parse_args_from(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut retries = None;
    let mut config = None;

    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--retries" => {
                let v = it.next().ok_or("--retries needs a value")?;
                retries = Some(v.parse().map_err(|_| format!("invalid --retries {v:?}"))?);
            }
            "--config" => {
                config = Some(PathBuf::from(it.next().ok_or("--config needs a path")?));
            }
            "-h" | "--help" => return Err(String::new()),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}")),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let host = positional.next().ok_or("missing <host>")?;
    let port = match positional.next() {
        Some(p) => match p.parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => return Err(format!("invalid port {p:?}")),
        },
        None => DEFAULT_PORT,
    };
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument {extra:?}"));
    }

    Ok(Args {
        host,
        port,
        retries,
        config,
    })
}

fn parse_args() -> Args {
    match parse_args_from(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}\n");
            }
            usage_and_exit()
        }
    }
}

fn report_auth_failure(err: &AuthError) {
    eprintln!("❌ {err}");
    eprintln!("💡 {}", err.operator_hint());
}

fn report_connect_failure(err: &ConnectionError) {
    error!(endpoint = %err.endpoint, attempts = err.attempts_exhausted, error = %err, "aika.connect.failed");
    match &err.reason {
        AttemptFailure::Auth(auth) => report_auth_failure(auth),
        _ => eprintln!("❌ {err}"),
    }
}

fn load_config(args: &Args) -> anyhow::Result<AikaConfig> {
    let mut cfg: AikaConfig = match &args.config {
        Some(path) => ConfigLoader::parse_from_path(path)?,
        None => ConfigLoader::parse_or_default(CONFIG_FILE)?,
    };
    cfg.apply_env();
    if let Some(retries) = args.retries {
        cfg.session.max_retries = retries;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Reconnects to the starting endpoint; exits the process if that fails too.
async fn rejoin(companion: &mut Companion, home: &Endpoint, retries: u32) {
    warn!(endpoint = %home, "aika.rejoin");
    if let Err(err) = companion.connect(home, retries).await {
        report_connect_failure(&err);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let args = parse_args();
    let cfg = load_config(&args)?;
    let retries = cfg.session.max_retries;
    let rejoin_enabled = cfg.session.rejoin_on_disconnect;

    let credentials = match TokenCacheProvider::from_settings(
        cfg.transport.offline,
        cfg.auth.token.clone(),
        cfg.auth.token_file.clone(),
    ) {
        Ok(provider) => provider,
        Err(err) => {
            report_auth_failure(&err);
            std::process::exit(1);
        }
    };

    let session = SessionManager::new(
        Arc::new(credentials),
        Arc::new(LineBridgeFactory::new(cfg.transport.bridge_addr.clone())),
        cfg.transport_config(),
        cfg.retry_policy(),
    );
    let mut companion = Companion::new(cfg.companion_config(), session);

    let home = Endpoint::new(args.host.clone(), args.port);
    info!(
        endpoint = %home,
        bot = %cfg.bot.name,
        bridge = %cfg.transport.bridge_addr,
        retries,
        "aika.start"
    );

    if let Err(err) = companion.connect(&home, retries).await {
        report_connect_failure(&err);
        std::process::exit(1);
    }

    loop {
        match after_run(companion.run().await, rejoin_enabled) {
            AfterRun::Stop => return Ok(()),
            AfterRun::Rejoin { announce } => {
                rejoin(&mut companion, &home, retries).await;
                if let Some(line) = announce {
                    companion.say(line);
                }
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum AfterRun {
    Stop,
    /// Go back home, then say `announce` there.
    Rejoin { announce: Option<String> },
}

/// A failed relocation always goes back home; `rejoin_on_disconnect` only covers sessions
/// that dropped on their own.
fn after_run(outcome: RunOutcome, rejoin_on_disconnect: bool) -> AfterRun {
    match outcome {
        RunOutcome::Disconnected { reason } => {
            if rejoin_on_disconnect {
                AfterRun::Rejoin { announce: None }
            } else {
                info!(reason = %reason, "aika.stopped");
                AfterRun::Stop
            }
        }
        RunOutcome::RelocationFailed { error } => {
            warn!(endpoint = %error.endpoint, error = %error, "aika.relocate.failed");
            AfterRun::Rejoin {
                announce: Some(lines::relocation_failed(&error.endpoint)),
            }
        }
    }
}
