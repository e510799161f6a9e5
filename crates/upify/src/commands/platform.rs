use colored::Colorize;
use std::path::Path;
use upify_core::Platform;

pub fn list(project_root: &Path) -> anyhow::Result<()> {
    let config = upify_core::load_config(project_root)?;
    let configured = config.configured_platforms();

    println!("{}", format!("プロジェクト: {}", config.name).bold());
    println!();

    for platform in Platform::ALL {
        let label = format!(
            "{:<4} {:<14} {}",
            platform.cli_name(),
            platform.deploy_id(),
            platform.display_name()
        );
        if configured.contains(&platform) {
            println!("  {} {}", "✓".green(), label);
        } else {
            println!("  {} {} {}", "-".dimmed(), label.dimmed(), "(未設定)".dimmed());
        }
    }

    if configured.is_empty() {
        println!();
        println!(
            "{}",
            "ヒント: `.upify/config.yaml` に `aws-lambda` または `gcp-cloudrun` セクションを追加してください".yellow()
        );
    }

    Ok(())
}
