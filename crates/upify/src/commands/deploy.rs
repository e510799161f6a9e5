use crate::progress::DeployProgress;
use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use upify_build::CommandInstaller;
use upify_cloud::FunctionPlatform;
use upify_cloud_aws::LambdaPlatform;
use upify_cloud_gcp::CloudFunctionsPlatform;
use upify_core::{DeploymentConfig, Platform};
use upify_deploy::Orchestrator;

/// 設定に従ってプラットフォーム実装を一度だけ選ぶ
async fn connect(
    platform: Platform,
    config: &DeploymentConfig,
) -> anyhow::Result<Box<dyn FunctionPlatform>> {
    let connector: Box<dyn FunctionPlatform> = match platform {
        Platform::AwsLambda => Box::new(LambdaPlatform::from_config(config.aws_lambda()?).await),
        Platform::GcpCloudRun => Box::new(
            CloudFunctionsPlatform::from_config(config.gcp_cloudrun()?)
                .await
                .context(
                    "GCP の認証に失敗しました。`gcloud auth login` を実行するか GOOGLE_OAUTH_ACCESS_TOKEN を設定してください",
                )?,
        ),
    };
    tracing::debug!(platform = %platform, "Connector ready");
    Ok(connector)
}

pub async fn handle(project_root: &Path, platform: Platform, verbose: bool) -> anyhow::Result<()> {
    let config = upify_core::load_config(project_root)?;
    config.validate_for(platform)?;

    println!(
        "{} {} → {}",
        "デプロイを開始します:".blue().bold(),
        config.name.cyan(),
        platform.display_name()
    );
    println!("言語: {} ({})", config.language, config.package_manager);

    let connector = connect(platform, &config).await?;
    let installer = CommandInstaller::new();

    let progress = DeployProgress::new(platform, verbose);
    let result = Orchestrator::new(&installer, connector.as_ref())
        .with_progress(|stage| progress.set_stage(stage))
        .deploy(project_root, &config)
        .await;

    match result {
        Ok(deployment) => {
            progress.finish_success();
            println!();
            println!("{}", "✓ デプロイが完了しました".green().bold());
            println!("  関数名: {}", deployment.resource_name.cyan());
            println!("  プラットフォーム: {}", deployment.platform.display_name());
            println!("  URL: {}", deployment.invocation_url.cyan().underline());
            if deployment.created {
                println!("  {}", "(新規作成)".dimmed());
            } else {
                println!("  {}", "(既存の関数を更新)".dimmed());
            }
            Ok(())
        }
        Err(e) => {
            progress.finish_error(e.stage());
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e.user_message());
            std::process::exit(1);
        }
    }
}
