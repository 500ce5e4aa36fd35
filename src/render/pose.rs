// 该文件是 Kanjian （看见） 项目的一部分。
// src/render/pose.rs - 人体姿态骨架
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

use crate::geometry::{color_for_index, scale};
use crate::model::{CoordSpace, Keypoint, KeypointKind, Pose, PoseResult};
use crate::render::{Annotate, Canvas};

const KEYPOINT_RADIUS: i32 = 2;

/// 骨架连线
const SKELETON: [(KeypointKind, KeypointKind); 12] = {
  use KeypointKind::*;
  [
    (LeftShoulder, RightShoulder),
    (LeftShoulder, LeftElbow),
    (LeftElbow, LeftWrist),
    (RightShoulder, RightElbow),
    (RightElbow, RightWrist),
    (LeftHip, RightHip),
    (LeftShoulder, RightHip),
    (RightShoulder, LeftHip),
    (LeftHip, LeftKnee),
    (LeftKnee, LeftAnkle),
    (RightHip, RightKnee),
    (RightKnee, RightAnkle),
  ]
};

impl PoseResult {
  fn to_pixel(&self, point: Keypoint) -> (f32, f32) {
    match self.space {
      CoordSpace::Pixel => (point.x, point.y),
      CoordSpace::Normalized { width, height } => (scale(point.x, width), scale(point.y, height)),
    }
  }

  fn pixel_of(&self, pose: &Pose, kind: KeypointKind) -> Option<(f32, f32)> {
    pose.keypoint(kind).map(|p| self.to_pixel(p))
  }
}

impl Annotate for PoseResult {
  fn annotate(&self, canvas: &mut Canvas<'_>) {
    for (i, pose) in self.poses.iter().enumerate() {
      let color = color_for_index(i);

      for kind in KeypointKind::ALL {
        if let Some((x, y)) = self.pixel_of(pose, kind) {
          canvas.fill_circle(x, y, KEYPOINT_RADIUS, color);
        }
      }

      // 端点缺失的连线直接跳过
      for (from, to) in SKELETON {
        if let (Some(a), Some(b)) = (self.pixel_of(pose, from), self.pixel_of(pose, to)) {
          canvas.stroke_line(a, b, color);
        }
      }
    }
  }
}
