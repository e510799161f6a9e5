mod commands;
mod progress;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use upify_core::Platform;

#[derive(Parser)]
#[command(name = "upify")]
#[command(about = "いつものWebアプリを、そのままサーバーレスへ。", long_about = None)]
struct Cli {
    /// 詳細なログを表示
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// プロジェクトをサーバーレス関数としてデプロイ
    Deploy {
        /// デプロイ先 (aws, gcp)
        #[arg(value_parser = parse_platform)]
        platform: Platform,
        /// プロジェクトのルートディレクトリ
        #[arg(short = 'C', long, env = "UPIFY_PROJECT_DIR", default_value = ".")]
        project: PathBuf,
    },
    /// デプロイ先プラットフォームの管理
    Platform {
        #[command(subcommand)]
        command: PlatformCommands,
    },
    /// バージョン情報を表示
    Version,
}

#[derive(Subcommand)]
enum PlatformCommands {
    /// 設定済みのプラットフォームを一覧表示
    List {
        /// プロジェクトのルートディレクトリ
        #[arg(short = 'C', long, env = "UPIFY_PROJECT_DIR", default_value = ".")]
        project: PathBuf,
    },
}

fn parse_platform(value: &str) -> Result<Platform, String> {
    value.parse::<Platform>().map_err(|e| e.to_string())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("upify {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Deploy { platform, project } => {
            commands::deploy::handle(&project, platform, cli.verbose).await
        }
        Commands::Platform {
            command: PlatformCommands::List { project },
        } => commands::platform::list(&project),
    }
}
