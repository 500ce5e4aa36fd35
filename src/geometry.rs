// 该文件是 Kanjian （看见） 项目的一部分。
// src/geometry.rs - 坐标换算、调色板与马赛克
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

use image::{Rgb, RgbImage};

/// 标注颜色，按检测序号循环使用
pub const PALETTE: [Rgb<u8>; 6] = [
  Rgb([255, 255, 0]), // 黄
  Rgb([0, 255, 255]), // 青
  Rgb([255, 0, 255]), // 紫
  Rgb([0, 255, 0]),   // 绿
  Rgb([0, 0, 255]),   // 蓝
  Rgb([255, 0, 0]),   // 红
];

/// 马赛克块大小 = 区域宽度 / PIXELATE_DIVISOR
const PIXELATE_DIVISOR: f32 = 8.0;

/// 归一化坐标转像素坐标，不做截断
pub fn scale(normalized: f32, axis_length: u32) -> f32 {
  normalized * axis_length as f32
}

/// 第 i 个实体的标注颜色
pub fn color_for_index(index: usize) -> Rgb<u8> {
  PALETTE[index % PALETTE.len()]
}

/// 像素空间中的矩形（浮点，尚未截断到图像范围）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl PixelRect {
  /// 由归一化的 (x, y, w, h) 和声明的图像尺寸构造
  pub fn from_normalized(x: f32, y: f32, w: f32, h: f32, width: u32, height: u32) -> Self {
    Self {
      x: scale(x, width),
      y: scale(y, height),
      width: scale(w, width),
      height: scale(h, height),
    }
  }

  /// 由两个角点构造，角点顺序任意
  pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self {
      x: x1.min(x2),
      y: y1.min(y2),
      width: (x2 - x1).abs(),
      height: (y2 - y1).abs(),
    }
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  /// 截断到 `image_width` x `image_height` 内的整数边界 [x0, x1) x [y0, y1)，
  /// 与图像无交集时返回 None
  pub fn clip(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = (self.x.floor() as i64).clamp(0, image_width as i64) as u32;
    let y0 = (self.y.floor() as i64).clamp(0, image_height as i64) as u32;
    let x1 = (self.right().ceil() as i64).clamp(0, image_width as i64) as u32;
    let y1 = (self.bottom().ceil() as i64).clamp(0, image_height as i64) as u32;

    if x0 >= x1 || y0 >= y1 {
      return None;
    }
    Some((x0, y0, x1, y1))
  }
}

/// Liang-Barsky 线段裁剪，完全落在 [0, width] x [0, height] 之外时返回 None
pub fn clip_segment(
  from: (f32, f32),
  to: (f32, f32),
  width: u32,
  height: u32,
) -> Option<((f32, f32), (f32, f32))> {
  let (dx, dy) = (to.0 - from.0, to.1 - from.1);
  let (mut t0, mut t1) = (0.0f32, 1.0f32);

  for (p, q) in [
    (-dx, from.0),
    (dx, width as f32 - from.0),
    (-dy, from.1),
    (dy, height as f32 - from.1),
  ] {
    if !(p.is_finite() && q.is_finite()) {
      return None;
    }
    if p == 0.0 {
      if q < 0.0 {
        return None;
      }
      continue;
    }
    let t = q / p;
    if p < 0.0 {
      t0 = t0.max(t);
    } else {
      t1 = t1.min(t);
    }
    if t0 > t1 {
      return None;
    }
  }

  Some((
    (from.0 + t0 * dx, from.1 + t0 * dy),
    (from.0 + t1 * dx, from.1 + t1 * dy),
  ))
}

/// 区域宽度对应的马赛克块大小，至少为 1
pub fn pixelate_block_size(region_width: f32) -> u32 {
  ((region_width / PIXELATE_DIVISOR) as u32).max(1)
}

/// 用块平均色替换 `rect` 内的像素，块网格以区域左上角为原点
pub fn pixelate_region(image: &mut RgbImage, rect: &PixelRect, block_size: u32) {
  let Some((x0, y0, x1, y1)) = rect.clip(image.width(), image.height()) else {
    return;
  };
  let block = block_size.max(1);

  for by in (y0..y1).step_by(block as usize) {
    let bh = block.min(y1 - by);
    for bx in (x0..x1).step_by(block as usize) {
      let bw = block.min(x1 - bx);

      let mut sum = [0u64; 3];
      for y in by..by + bh {
        for x in bx..bx + bw {
          let pixel = image.get_pixel(x, y);
          for (acc, value) in sum.iter_mut().zip(pixel.0) {
            *acc += value as u64;
          }
        }
      }

      let count = (bw as u64) * (bh as u64);
      let average = Rgb(sum.map(|s| (s / count) as u8));
      for y in by..by + bh {
        for x in bx..bx + bw {
          image.put_pixel(x, y, average);
        }
      }
    }
  }
}
