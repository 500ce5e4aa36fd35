// 该文件是 Kanjian （看见） 项目的一部分。
// src/model.rs - 视觉分析结果
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

/// 归一化坐标点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 人脸特征点分组
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacialPoints {
  pub nose: Vec<Point>,
  pub left_eye: Vec<Point>,
  pub right_eye: Vec<Point>,
  pub lips: Vec<Point>,
}

impl FacialPoints {
  pub fn iter(&self) -> impl Iterator<Item = &Point> {
    self
      .nose
      .iter()
      .chain(&self.left_eye)
      .chain(&self.right_eye)
      .chain(&self.lips)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
  pub x: f32,
  pub y: f32,
  pub w: f32,
  pub h: f32,
  pub points: FacialPoints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceResult {
  /// 响应中声明的图像宽度
  pub width: u32,
  /// 响应中声明的图像高度
  pub height: u32,
  pub faces: Vec<Face>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  pub class: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductResult {
  pub width: u32,
  pub height: u32,
  pub objects: Vec<Product>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NsfwScores {
  pub normal: f32,
  pub soft: f32,
  pub adult: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagResult {
  pub labels: Vec<String>,
  pub localized: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
  pub words: Vec<String>,
}

/// 姿态关键点，顺序与 COCO 一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypointKind {
  Nose,
  LeftEye,
  RightEye,
  LeftEar,
  RightEar,
  LeftShoulder,
  RightShoulder,
  LeftElbow,
  RightElbow,
  LeftWrist,
  RightWrist,
  LeftHip,
  RightHip,
  LeftKnee,
  RightKnee,
  LeftAnkle,
  RightAnkle,
}

impl KeypointKind {
  pub const COUNT: usize = 17;

  pub const ALL: [KeypointKind; Self::COUNT] = [
    KeypointKind::Nose,
    KeypointKind::LeftEye,
    KeypointKind::RightEye,
    KeypointKind::LeftEar,
    KeypointKind::RightEar,
    KeypointKind::LeftShoulder,
    KeypointKind::RightShoulder,
    KeypointKind::LeftElbow,
    KeypointKind::RightElbow,
    KeypointKind::LeftWrist,
    KeypointKind::RightWrist,
    KeypointKind::LeftHip,
    KeypointKind::RightHip,
    KeypointKind::LeftKnee,
    KeypointKind::RightKnee,
    KeypointKind::LeftAnkle,
    KeypointKind::RightAnkle,
  ];

  pub fn index(self) -> usize {
    self as usize
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub score: f32,
}

/// 单个人体姿态；低于置信度阈值的关键点为 None
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pose {
  pub keypoints: [Option<Keypoint>; KeypointKind::COUNT],
  pub score: f32,
}

impl Pose {
  pub fn keypoint(&self, kind: KeypointKind) -> Option<Keypoint> {
    self.keypoints[kind.index()]
  }

  pub fn is_empty(&self) -> bool {
    self.keypoints.iter().all(Option::is_none)
  }
}

/// 姿态坐标所在空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordSpace {
  Pixel,
  Normalized { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoseResult {
  pub space: CoordSpace,
  pub poses: Vec<Pose>,
}

/// 一次远程分析的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
  Faces(FaceResult),
  Products(ProductResult),
  Nsfw(NsfwScores),
  Tags(TagResult),
  Poses(PoseResult),
  Texts(Vec<TextBlock>),
}

impl DetectionResult {
  /// 结果中感兴趣实体的数量，NSFW 分数恒为 1
  pub fn entity_count(&self) -> usize {
    match self {
      DetectionResult::Faces(r) => r.faces.len(),
      DetectionResult::Products(r) => r.objects.len(),
      DetectionResult::Nsfw(_) => 1,
      DetectionResult::Tags(r) => r.labels.len(),
      DetectionResult::Poses(r) => r.poses.iter().filter(|p| !p.is_empty()).count(),
      DetectionResult::Texts(blocks) => blocks.iter().map(|b| b.words.len()).sum(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.entity_count() == 0
  }
}
