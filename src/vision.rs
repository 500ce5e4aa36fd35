// 该文件是 Kanjian （看见） 项目的一部分。
// src/vision.rs - 远程视觉分析服务
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

use async_trait::async_trait;
use thiserror::Error;

use crate::command::VisionCommand;
use crate::model::{
  DetectionResult, FaceResult, NsfwScores, PoseResult, ProductResult, TagResult, TextBlock,
};

mod kakao;
pub use self::kakao::KakaoVision;

#[derive(Error, Debug)]
pub enum VisionError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("API error ({status}): {message}")]
  Api { status: u16, message: String },
  #[error("invalid response: {0}")]
  Decode(#[from] serde_json::Error),
  #[error("invalid endpoint: {0}")]
  Url(#[from] url::ParseError),
}

/// 每种分析一个远程调用，单次尝试不重试
#[async_trait]
pub trait VisionService: Send + Sync {
  async fn detect_faces(&self, image: &[u8], threshold: f32) -> Result<FaceResult, VisionError>;
  async fn detect_products(&self, image: &[u8], threshold: f32)
  -> Result<ProductResult, VisionError>;
  async fn detect_nsfw(&self, image: &[u8]) -> Result<NsfwScores, VisionError>;
  async fn generate_tags(&self, image: &[u8]) -> Result<TagResult, VisionError>;
  async fn analyze_poses(&self, image: &[u8]) -> Result<PoseResult, VisionError>;
  async fn extract_texts(&self, image: &[u8]) -> Result<Vec<TextBlock>, VisionError>;
}

/// 检测阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  pub face: f32,
  pub product: f32,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      face: 0.7,
      product: 0.7,
    }
  }
}

/// 按命令发起对应的远程调用
pub async fn analyze<V: VisionService + ?Sized>(
  service: &V,
  command: VisionCommand,
  image: &[u8],
  thresholds: Thresholds,
) -> Result<DetectionResult, VisionError> {
  let result = match command {
    VisionCommand::DetectFaces | VisionCommand::MaskFaces => {
      DetectionResult::Faces(service.detect_faces(image, thresholds.face).await?)
    }
    VisionCommand::DetectProducts => {
      DetectionResult::Products(service.detect_products(image, thresholds.product).await?)
    }
    VisionCommand::DetectNsfw => DetectionResult::Nsfw(service.detect_nsfw(image).await?),
    VisionCommand::Tag => DetectionResult::Tags(service.generate_tags(image).await?),
    VisionCommand::AnalyzePoses => DetectionResult::Poses(service.analyze_poses(image).await?),
    VisionCommand::ExtractTexts => DetectionResult::Texts(service.extract_texts(image).await?),
  };
  Ok(result)
}
