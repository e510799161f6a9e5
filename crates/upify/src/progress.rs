use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use upify_core::Platform;
use upify_deploy::DeployStage;

pub struct DeployProgress {
    progress_bar: ProgressBar,
}

impl DeployProgress {
    /// `hidden` のときはスピナーを描画しない（詳細ログと混ざるため）
    pub fn new(platform: Platform, hidden: bool) -> Self {
        let pb = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(format!("{} へデプロイしています...", platform.display_name()));
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    pub fn set_stage(&self, stage: DeployStage) {
        self.progress_bar.set_message(format!("{}...", stage.label()));
    }

    pub fn finish_success(&self) {
        self.progress_bar.finish_with_message("デプロイ完了 ✓");
    }

    pub fn finish_error(&self, stage: DeployStage) {
        self.progress_bar
            .finish_with_message(format!("{}に失敗しました ✗", stage));
    }
}
