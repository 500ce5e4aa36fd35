// 该文件是 Kanjian （看见） 项目的一部分。
// src/config.rs - JSON 配置文件
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::vision::Thresholds;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_FONT_PATH: &str = "fonts/RobotoCondensed-Regular.ttf";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("无法读取配置文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("配置文件格式错误: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("配置项 '{0}' 不能为空")]
  Missing(&'static str),
  #[error("max-concurrent-requests 必须大于 0")]
  ZeroConcurrency,
  #[error("max-concurrent-requests 不能超过 {max}: {0}", max = Semaphore::MAX_PERMITS)]
  TooManyConcurrent(usize),
  #[error("阈值 '{name}' 超出范围 [0, 1]: {value}")]
  Threshold { name: &'static str, value: f32 },
}

fn default_interval() -> i64 {
  1
}

fn default_font_path() -> PathBuf {
  PathBuf::from(DEFAULT_FONT_PATH)
}

fn default_max_concurrent_requests() -> usize {
  DEFAULT_MAX_CONCURRENT_REQUESTS
}

fn default_threshold() -> f32 {
  0.7
}

/// 机器人配置
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
  pub telegram_api_token: String,
  /// 长轮询超时秒数，非正值按 1 处理
  #[serde(default = "default_interval")]
  pub telegram_monitor_interval_seconds: i64,
  pub kakao_rest_api_key: String,
  /// 设置后日志同时发往 Loggly
  #[serde(default)]
  pub loggly_token: Option<String>,
  #[serde(default)]
  pub is_verbose: bool,
  #[serde(default = "default_font_path")]
  pub font_path: PathBuf,
  #[serde(default = "default_max_concurrent_requests")]
  pub max_concurrent_requests: usize,
  #[serde(default = "default_threshold")]
  pub face_threshold: f32,
  #[serde(default = "default_threshold")]
  pub product_threshold: f32,
}

impl Config {
  /// 读取并校验配置，相对的字体路径以配置文件所在目录为基准
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let mut config = Self::from_json(&text)?;
    if config.font_path.is_relative() {
      let base = path.parent().unwrap_or_else(|| Path::new("."));
      config.font_path = base.join(&config.font_path);
    }
    debug!("已加载配置文件: {}", path.display());
    Ok(config)
  }

  pub fn from_json(text: &str) -> Result<Self, ConfigError> {
    let mut config: Config = serde_json::from_str(text)?;
    config.validate()?;
    if config.telegram_monitor_interval_seconds <= 0 {
      warn!(
        "telegram-monitor-interval-seconds 为 {}，改用 1 秒",
        config.telegram_monitor_interval_seconds
      );
      config.telegram_monitor_interval_seconds = 1;
    }
    if config.loggly_token.as_deref().is_some_and(str::is_empty) {
      config.loggly_token = None;
    }
    Ok(config)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.telegram_api_token.is_empty() {
      return Err(ConfigError::Missing("telegram-api-token"));
    }
    if self.kakao_rest_api_key.is_empty() {
      return Err(ConfigError::Missing("kakao-rest-api-key"));
    }
    if self.max_concurrent_requests == 0 {
      return Err(ConfigError::ZeroConcurrency);
    }
    if self.max_concurrent_requests > Semaphore::MAX_PERMITS {
      return Err(ConfigError::TooManyConcurrent(self.max_concurrent_requests));
    }
    for (name, value) in [
      ("face-threshold", self.face_threshold),
      ("product-threshold", self.product_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Threshold { name, value });
      }
    }
    Ok(())
  }

  pub fn monitor_interval(&self) -> Duration {
    Duration::from_secs(self.telegram_monitor_interval_seconds.max(1) as u64)
  }

  pub fn thresholds(&self) -> Thresholds {
    Thresholds {
      face: self.face_threshold,
      product: self.product_threshold,
    }
  }
}
