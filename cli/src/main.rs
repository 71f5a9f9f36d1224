use clap::Parser;
use taskpilot_cli::app;
use taskpilot_cli::commands::cli;
use taskpilot_core::api::{AppConfig, CliError, DaemonError, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

fn load_config(args: &cli::Args) -> Result<AppConfig, CliError> {
    let loaded = match args.config.as_deref() {
        Some(path) => taskpilot_core::api::load_from_path(path),
        None => taskpilot_core::api::load_default(),
    };
    let mut cfg = loaded.map_err(|e| CliError::Config(format!("{e:#}")))?;
    app::apply_overrides(&mut cfg, args);
    Ok(cfg)
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = load_config(&args)?;

    match args.command {
        cli::Commands::Run => {
            init_tracing(&cfg.logging).map_err(CliError::Command)?;
            app::run_daemon(cfg).await
        }
        cli::Commands::Once => {
            init_tracing(&cfg.logging).map_err(CliError::Command)?;
            app::run_once(cfg).await
        }
        cli::Commands::Render(render_args) => {
            println!("{}", app::render_task(&cfg, &render_args)?);
            Ok(0)
        }
        cli::Commands::CheckTemplate(check_args) => {
            let (normalized, warnings) = app::check_template(&cfg, &check_args);
            println!("{normalized}");
            for w in &warnings {
                eprintln!("warning: {w}");
            }
            Ok(0)
        }
    }
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 20: IO / command error
    // 30: daemon or queue collaborator error
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Daemon(de) => match de {
            DaemonError::Config(_) => 11,
            DaemonError::Io(_) => 20,
            DaemonError::Render(_) => 20,
            DaemonError::Queue(_) => 30,
            DaemonError::Join(_) => 50,
        },
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("taskpilot"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("taskpilot.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
