use crate::error::{IntakeError, Result};
use part_intake_common::MatchOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DATA_DIR_ENV: &str = "PART_INTAKE_DATA_DIR";
const USER_ENV: &str = "PART_INTAKE_USER";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub default_user: Option<String>,
    pub pipeline: PipelineConfig,
}

/// 読み取り・照合パイプラインの調整値
///
/// どれも経験的な値で、根拠があるわけではない。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// 平均誤差がこの値未満なら読み取り結果を採用
    pub accept_threshold: f32,
    /// あいまい一致の許容距離
    pub match_tolerance: usize,
    /// 前処理後の長辺の最大ピクセル数
    pub target_size: u32,
    /// 小さい画像を拡大する倍率の上限
    pub max_upscale: f32,
    /// コントラスト伸張後のガンマ
    pub gamma: f32,
    /// ヒストグラムの暗部側パーセンタイル
    pub low_percentile: f32,
    /// ヒストグラムの明部側パーセンタイル
    pub high_percentile: f32,
    /// シャープ化前の線形コントラスト
    pub sharpen_contrast: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.15,
            match_tolerance: 2,
            target_size: 1920,
            max_upscale: 2.5,
            gamma: 0.9,
            low_percentile: 0.05,
            high_percentile: 0.95,
            sharpen_contrast: 1.2,
        }
    }
}

impl PipelineConfig {
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            tolerance: self.match_tolerance,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.low_percentile)
            || !(0.0..=1.0).contains(&self.high_percentile)
            || self.low_percentile >= self.high_percentile
        {
            return Err(IntakeError::Config(format!(
                "パーセンタイルが不正です: {} / {}",
                self.low_percentile, self.high_percentile
            )));
        }
        if self.target_size == 0 {
            return Err(IntakeError::Config("target_size は1以上にしてください".into()));
        }
        if self.max_upscale < 1.0 || self.gamma <= 0.0 || self.accept_threshold <= 0.0 {
            return Err(IntakeError::Config(
                "max_upscale は1以上、gamma と accept_threshold は正の値にしてください".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("db"),
            default_user: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.pipeline.validate()?;
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| IntakeError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("part-intake").join("config.json"))
    }

    /// データディレクトリ（環境変数を優先）
    pub fn data_dir(&self) -> PathBuf {
        std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir.clone())
    }

    /// 登録者名（環境変数を優先）
    pub fn user(&self) -> Option<String> {
        std::env::var(USER_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| self.default_user.clone())
    }
}
