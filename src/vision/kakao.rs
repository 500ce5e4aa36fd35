// 该文件是 Kanjian （看见） 项目的一部分。
// src/vision/kakao.rs - Kakao Vision REST 客户端
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
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::model::{
  CoordSpace, Face, FaceResult, FacialPoints, Keypoint, KeypointKind, NsfwScores, Point, Pose,
  PoseResult, Product, ProductResult, TagResult, TextBlock,
};
use crate::vision::{VisionError, VisionService};

pub const DEFAULT_VISION_URL: &str = "https://dapi.kakao.com/v2/vision/";
pub const DEFAULT_POSE_URL: &str = "https://cv-api.kakaobrain.com/pose";

/// 低于该分数的姿态关键点视为缺失
const POSE_KEYPOINT_MIN_SCORE: f32 = 0.2;

/// Kakao Vision API 客户端
pub struct KakaoVision {
  http_client: reqwest::Client,
  api_key: String,
  vision_url: Url,
  pose_url: Url,
}

impl KakaoVision {
  pub fn new(api_key: impl Into<String>) -> Result<Self, VisionError> {
    Self::with_endpoints(api_key, DEFAULT_VISION_URL, DEFAULT_POSE_URL)
  }

  /// `vision_url` 以 `/` 结尾，各分析接口相对它拼接
  pub fn with_endpoints(
    api_key: impl Into<String>,
    vision_url: &str,
    pose_url: &str,
  ) -> Result<Self, VisionError> {
    Ok(Self {
      http_client: reqwest::Client::new(),
      api_key: api_key.into(),
      vision_url: Url::parse(vision_url)?,
      pose_url: Url::parse(pose_url)?,
    })
  }

  async fn post<T: DeserializeOwned>(
    &self,
    url: Url,
    field: &'static str,
    image: &[u8],
    threshold: Option<f32>,
  ) -> Result<T, VisionError> {
    let part = Part::bytes(image.to_vec()).file_name("image.jpg");
    let mut form = Form::new().part(field, part);
    if let Some(threshold) = threshold {
      form = form.text("threshold", threshold.to_string());
    }

    debug!(url = %url, image_size = image.len(), "调用 Kakao Vision API");

    let response = self
      .http_client
      .post(url)
      .header("Authorization", format!("KakaoAK {}", self.api_key))
      .multipart(form)
      .send()
      .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
      return Err(VisionError::Api {
        status: status.as_u16(),
        message: error_message(&body),
      });
    }

    Ok(serde_json::from_str(&body)?)
  }

  async fn vision<T: DeserializeOwned>(
    &self,
    path: &str,
    image: &[u8],
    threshold: Option<f32>,
  ) -> Result<T, VisionError> {
    let url = self.vision_url.join(path)?;
    let envelope: Envelope<T> = self.post(url, "image", image, threshold).await?;
    Ok(envelope.result)
  }
}

/// 从错误响应中取出 msg 字段，取不到则原样返回
fn error_message(body: &str) -> String {
  #[derive(Deserialize)]
  struct ApiError {
    msg: String,
  }

  serde_json::from_str::<ApiError>(body)
    .map(|e| e.msg)
    .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl VisionService for KakaoVision {
  async fn detect_faces(&self, image: &[u8], threshold: f32) -> Result<FaceResult, VisionError> {
    let wire: FaceWire = self.vision("face/detect", image, Some(threshold)).await?;
    Ok(wire.into())
  }

  async fn detect_products(
    &self,
    image: &[u8],
    threshold: f32,
  ) -> Result<ProductResult, VisionError> {
    let wire: ProductWire = self
      .vision("product/detect", image, Some(threshold))
      .await?;
    Ok(wire.into())
  }

  async fn detect_nsfw(&self, image: &[u8]) -> Result<NsfwScores, VisionError> {
    let wire: NsfwWire = self.vision("adult/detect", image, None).await?;
    Ok(NsfwScores {
      normal: wire.normal,
      soft: wire.soft,
      adult: wire.adult,
    })
  }

  async fn generate_tags(&self, image: &[u8]) -> Result<TagResult, VisionError> {
    let wire: TagWire = self.vision("multitag/generate", image, None).await?;
    Ok(TagResult {
      labels: wire.label,
      localized: wire.label_kr,
    })
  }

  async fn analyze_poses(&self, image: &[u8]) -> Result<PoseResult, VisionError> {
    let wire: Vec<PoseWire> = self
      .post(self.pose_url.clone(), "file", image, None)
      .await?;
    Ok(PoseResult {
      space: CoordSpace::Pixel,
      poses: wire.into_iter().map(Pose::from).collect(),
    })
  }

  async fn extract_texts(&self, image: &[u8]) -> Result<Vec<TextBlock>, VisionError> {
    let wire: Vec<TextWire> = self.vision("text/ocr", image, None).await?;
    Ok(
      wire
        .into_iter()
        .map(|t| TextBlock {
          words: t.recognition_words,
        })
        .collect(),
    )
  }
}

// Kakao 响应格式
#[derive(Deserialize)]
struct Envelope<T> {
  result: T,
}

#[derive(Deserialize)]
struct FaceWire {
  width: u32,
  height: u32,
  #[serde(default)]
  faces: Vec<FaceEntry>,
}

#[derive(Deserialize)]
struct FaceEntry {
  x: f32,
  y: f32,
  w: f32,
  h: f32,
  #[serde(default)]
  facial_points: FacialPointsWire,
}

#[derive(Deserialize, Default)]
struct FacialPointsWire {
  #[serde(default)]
  nose: Vec<[f32; 2]>,
  #[serde(default)]
  left_eye: Vec<[f32; 2]>,
  #[serde(default)]
  right_eye: Vec<[f32; 2]>,
  #[serde(default)]
  lip: Vec<[f32; 2]>,
}

fn points(raw: Vec<[f32; 2]>) -> Vec<Point> {
  raw.into_iter().map(|[x, y]| Point::new(x, y)).collect()
}

impl From<FaceWire> for FaceResult {
  fn from(wire: FaceWire) -> Self {
    let faces = wire
      .faces
      .into_iter()
      .map(|f| Face {
        x: f.x,
        y: f.y,
        w: f.w,
        h: f.h,
        points: FacialPoints {
          nose: points(f.facial_points.nose),
          left_eye: points(f.facial_points.left_eye),
          right_eye: points(f.facial_points.right_eye),
          lips: points(f.facial_points.lip),
        },
      })
      .collect();

    FaceResult {
      width: wire.width,
      height: wire.height,
      faces,
    }
  }
}

#[derive(Deserialize)]
struct ProductWire {
  width: u32,
  height: u32,
  #[serde(default)]
  objects: Vec<ProductEntry>,
}

#[derive(Deserialize)]
struct ProductEntry {
  x1: f32,
  y1: f32,
  x2: f32,
  y2: f32,
  class: String,
}

impl From<ProductWire> for ProductResult {
  fn from(wire: ProductWire) -> Self {
    let objects = wire
      .objects
      .into_iter()
      .map(|o| Product {
        x1: o.x1,
        y1: o.y1,
        x2: o.x2,
        y2: o.y2,
        class: o.class,
      })
      .collect();

    ProductResult {
      width: wire.width,
      height: wire.height,
      objects,
    }
  }
}

#[derive(Deserialize)]
struct NsfwWire {
  normal: f32,
  soft: f32,
  adult: f32,
}

#[derive(Deserialize)]
struct TagWire {
  #[serde(default)]
  label: Vec<String>,
  #[serde(default)]
  label_kr: Vec<String>,
}

#[derive(Deserialize)]
struct TextWire {
  #[serde(default)]
  recognition_words: Vec<String>,
}

/// keypoints 为 17 组 [x, y, score]，像素坐标
#[derive(Deserialize)]
struct PoseWire {
  #[serde(default)]
  keypoints: Vec<f32>,
  #[serde(default)]
  score: f32,
}

impl From<PoseWire> for Pose {
  fn from(wire: PoseWire) -> Self {
    let mut pose = Pose {
      score: wire.score,
      ..Default::default()
    };
    for (kind, chunk) in KeypointKind::ALL.into_iter().zip(wire.keypoints.chunks_exact(3)) {
      let keypoint = Keypoint {
        x: chunk[0],
        y: chunk[1],
        score: chunk[2],
      };
      if keypoint.score >= POSE_KEYPOINT_MIN_SCORE {
        pose.keypoints[kind.index()] = Some(keypoint);
      }
    }
    pose
  }
}
