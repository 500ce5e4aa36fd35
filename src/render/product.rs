// 该文件是 Kanjian （看见） 项目的一部分。
// src/render/product.rs - 商品检测框
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
use crate::model::ProductResult;
use crate::render::{Annotate, Canvas};

impl Annotate for ProductResult {
  fn annotate(&self, canvas: &mut Canvas<'_>) {
    for (i, object) in self.objects.iter().enumerate() {
      let color = color_for_index(i);
      let rect = PixelRect::from_corners(
        scale(object.x1, self.width),
        scale(object.y1, self.height),
        scale(object.x2, self.width),
        scale(object.y2, self.height),
      );

      canvas.push_class(&object.class);
      canvas.stroke_rect(&rect, color);
      canvas.label_bottom_left(&rect, format!("#{}: {}", i + 1, object.class), color);
    }
  }
}
