use anyhow::Context;
use clap::{value_parser, Arg, ArgMatches, Command};
use image_compressor::core::events::WorkflowEvent;
use image_compressor::core::model::{SourceFile, WorkflowState, DEFAULT_TARGET_SIZE_KB};
use image_compressor::core::saver::DirectorySaver;
use image_compressor::core::workflow::CompressionWorkflow;
use image_compressor::i18n::{get_messages, Locale};
use image_compressor::plugins::registry::{CompressCliConfig, DriverContext, PluginRegistry};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const BACKEND_URL_ENV: &str = "IMAGE_COMPRESSOR_BACKEND_URL";

fn build_cli(registry: &PluginRegistry) -> Command {
    let compress = Command::new("compress")
        .about("Compress an image with the remote compression service")
        .arg(
            Arg::new("file")
                .help("Image file to compress")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("target_kb")
                .long("target-kb")
                .help("Desired output size in kilobytes")
                .value_parser(value_parser!(u32).range(1..))
                .default_value(DEFAULT_TARGET_SIZE_KB)
                .num_args(1),
        )
        .arg(
            Arg::new("backend_url")
                .long("backend-url")
                .help("Base URL of the compression service")
                .env(BACKEND_URL_ENV)
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Directory the compressed image is saved into")
                .value_parser(value_parser!(PathBuf))
                .default_value(".")
                .num_args(1),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .help("Message language (en, zh)")
                .default_value("en")
                .num_args(1),
        );

    let compress = registry.augment_compress_command(compress);

    Command::new("image-compressor")
        .about("Image compression client for a remote compression service")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(compress)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let registry = PluginRegistry::with_defaults()?;
    let matches = build_cli(&registry).get_matches();

    match matches.subcommand() {
        Some(("compress", m)) => run_compress(&registry, m).await,
        _ => Ok(ExitCode::SUCCESS),
    }
}

async fn run_compress(registry: &PluginRegistry, m: &ArgMatches) -> anyhow::Result<ExitCode> {
    let file = m.get_one::<PathBuf>("file").context("missing file")?;
    let target_kb = *m.get_one::<u32>("target_kb").context("missing --target-kb")?;
    let backend_url = m.get_one::<String>("backend_url").context("missing --backend-url")?;
    let out_dir = m.get_one::<PathBuf>("out_dir").context("missing --out-dir")?;
    let locale = m
        .get_one::<String>("locale")
        .map(|s| Locale::parse(s))
        .unwrap_or_default();
    let msgs = get_messages(locale);

    let mut cfg = CompressCliConfig { driver_ctx: DriverContext::new(backend_url.clone()) };
    registry.apply_compress_matches(m, &mut cfg)?;

    let driver = registry
        .driver_for(backend_url)
        .with_context(|| format!("no driver for backend url {}", backend_url))?;
    let saver = Arc::new(DirectorySaver::new(out_dir.clone()));
    let source = SourceFile::from_path(file).await?;

    let mut workflow = CompressionWorkflow::new(driver, saver, cfg.driver_ctx);
    tracing::debug!(driver = workflow.driver_name(), out_dir = %out_dir.display(), "workflow ready");
    workflow.set_target_size(target_kb.to_string());
    workflow.select_file(source);

    let sty_bar = ProgressStyle::with_template("{prefix} {bar:40.cyan/blue} {pos:>3}% {wide_msg}")?;
    let mut rx = workflow.subscribe();
    let ui_task = tokio::spawn(async move {
        let pb = ProgressBar::new(100);
        pb.set_style(sty_bar);
        pb.set_prefix(msgs.compressing);

        while let Ok(evt) = rx.recv().await {
            match evt {
                WorkflowEvent::StateChanged { state } => match state {
                    WorkflowState::Submitting => pb.set_message(msgs.uploading),
                    WorkflowState::Idle => {
                        pb.finish_and_clear();
                        break;
                    }
                    s if s.is_terminal() => pb.set_position(0),
                    _ => {}
                },
                WorkflowEvent::Progress { percent, .. } => {
                    pb.set_position(percent as u64);
                    if percent >= 100 {
                        pb.set_message(msgs.waiting);
                    }
                }
                WorkflowEvent::Saved { path, bytes, .. } => {
                    pb.println(format!("{} {} ({})", msgs.saved, path.display(), fmt_bytes(bytes)));
                }
                WorkflowEvent::Error { message } => {
                    pb.println(format!("[{}] {}", msgs.error_prefix, message));
                }
            }
        }
        pb.finish_and_clear();
    });

    let outcome = workflow.submit().await;
    drop(workflow);
    let _ = ui_task.await;

    Ok(match outcome {
        Ok(o) => {
            tracing::debug!(request_id = %o.request_id, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(error = %e, "{}", msgs.failed);
            ExitCode::FAILURE
        }
    })
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let f = n as f64;
    if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}
