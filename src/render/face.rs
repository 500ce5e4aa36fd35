// 该文件是 Kanjian （看见） 项目的一部分。
// src/render/face.rs - 人脸框、特征点与人脸马赛克
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

use crate::geometry::{PixelRect, color_for_index, scale};
use crate::model::{Face, FaceResult};
use crate::render::{Annotate, Canvas};

const LANDMARK_RADIUS: i32 = 1;

fn face_rect(face: &Face, result: &FaceResult) -> PixelRect {
  PixelRect::from_normalized(face.x, face.y, face.w, face.h, result.width, result.height)
}

impl Annotate for FaceResult {
  fn annotate(&self, canvas: &mut Canvas<'_>) {
    for (i, face) in self.faces.iter().enumerate() {
      let color = color_for_index(i);
      let rect = face_rect(face, self);

      canvas.stroke_rect(&rect, color);
      canvas.label_bottom_left(&rect, format!("Face #{}", i + 1), color);

      for point in face.points.iter() {
        canvas.fill_circle(
          scale(point.x, self.width),
          scale(point.y, self.height),
          LANDMARK_RADIUS,
          color,
        );
      }
    }
  }
}

/// 把人脸区域打上马赛克，不画框和标签
pub struct FaceMask<'a>(pub &'a FaceResult);

impl Annotate for FaceMask<'_> {
  fn annotate(&self, canvas: &mut Canvas<'_>) {
    for face in &self.0.faces {
      canvas.pixelate(&face_rect(face, self.0));
    }
  }
}
