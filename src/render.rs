// 该文件是 Kanjian （看见） 项目的一部分。
// src/render.rs - 分析结果标注
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
  draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::warn;

use crate::command::VisionCommand;
use crate::geometry::{PixelRect, clip_segment, pixelate_block_size, pixelate_region};
use crate::model::DetectionResult;

mod face;
mod pose;
mod product;
pub mod text;

pub use self::face::FaceMask;

// 绘制常量
const STROKE_WIDTH: u32 = 2;
const LABEL_INSET: f32 = 5.0;
const FONT_SIZE_DIVISOR: f32 = 24.0;

#[derive(Error, Debug)]
pub enum RenderError {
  #[error("'{command}' cannot draw a {kind} result")]
  NotDrawable {
    command: VisionCommand,
    kind: &'static str,
  },
  #[error("无法读取字体文件: {0}")]
  FontIo(#[from] std::io::Error),
  #[error("无法解析字体文件: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 标签未能绘制的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSkipReason {
  /// 未加载字体
  NoFont,
  /// 锚点落在图像之外
  OutOfBounds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLabel {
  pub text: String,
  pub reason: LabelSkipReason,
}

/// 标注结果；`skipped_labels` 非空时为部分成功
#[derive(Debug, Clone)]
pub struct Rendered {
  pub image: RgbImage,
  /// 商品检测的类别，按检测顺序
  pub classes: Vec<String>,
  pub skipped_labels: Vec<SkippedLabel>,
}

impl Rendered {
  pub fn is_complete(&self) -> bool {
    self.skipped_labels.is_empty()
  }
}

/// 可以画到画布上的检测结果
pub trait Annotate {
  fn annotate(&self, canvas: &mut Canvas<'_>);
}

/// 绘制用的画布，持有输入图像的副本
pub struct Canvas<'a> {
  image: RgbImage,
  font: Option<&'a FontArc>,
  font_scale: PxScale,
  classes: Vec<String>,
  skipped_labels: Vec<SkippedLabel>,
}

impl<'a> Canvas<'a> {
  fn new(image: RgbImage, font: Option<&'a FontArc>) -> Self {
    let font_scale = PxScale::from((image.height() as f32 / FONT_SIZE_DIVISOR).max(1.0));
    Self {
      image,
      font,
      font_scale,
      classes: Vec::new(),
      skipped_labels: Vec::new(),
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 描边矩形，线宽 STROKE_WIDTH，向内加粗；完全在图像外时不画
  pub fn stroke_rect(&mut self, rect: &PixelRect, color: Rgb<u8>) {
    if rect.clip(self.width(), self.height()).is_none() {
      return;
    }
    // 越界的边收到图像外一个线宽处，保证整数运算不溢出
    let margin = STROKE_WIDTH as f32;
    let clamp_x = |v: f32| v.round().clamp(-margin, self.width() as f32 + margin);
    let clamp_y = |v: f32| v.round().clamp(-margin, self.height() as f32 + margin);
    let (left, right) = (clamp_x(rect.x), clamp_x(rect.right()));
    let (top, bottom) = (clamp_y(rect.y), clamp_y(rect.bottom()));

    let x = left as i32;
    let y = top as i32;
    let width = (right - left) as u32;
    let height = (bottom - top) as u32;

    for inset in 0..STROKE_WIDTH {
      let (w, h) = (
        width.saturating_sub(2 * inset),
        height.saturating_sub(2 * inset),
      );
      if w == 0 || h == 0 {
        break;
      }
      let outline = Rect::at(x + inset as i32, y + inset as i32).of_size(w, h);
      draw_hollow_rect_mut(&mut self.image, outline, color);
    }
  }

  /// 圆心离图像超过半径时不画
  pub fn fill_circle(&mut self, x: f32, y: f32, radius: i32, color: Rgb<u8>) {
    let r = radius as f32;
    let visible =
      x >= -r && y >= -r && x <= self.width() as f32 + r && y <= self.height() as f32 + r;
    if !visible {
      return;
    }
    draw_filled_circle_mut(
      &mut self.image,
      (x.round() as i32, y.round() as i32),
      radius,
      color,
    );
  }

  pub fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgb<u8>) {
    let (width, height) = (self.width(), self.height());
    for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
      let start = (from.0 + dx, from.1 + dy);
      let end = (to.0 + dx, to.1 + dy);
      let Some((start, end)) = clip_segment(start, end, width, height) else {
        continue;
      };
      draw_line_segment_mut(&mut self.image, start, end, color);
    }
  }

  pub fn pixelate(&mut self, rect: &PixelRect) {
    pixelate_region(&mut self.image, rect, pixelate_block_size(rect.width));
  }

  /// 在矩形左下角内侧绘制标签，失败只记录不中断
  pub fn label_bottom_left(&mut self, rect: &PixelRect, text: String, color: Rgb<u8>) {
    let x = rect.x + LABEL_INSET;
    let baseline = rect.bottom() - LABEL_INSET;

    let Some(font) = self.font else {
      self.skip_label(text, LabelSkipReason::NoFont);
      return;
    };
    if x < 0.0 || baseline < 0.0 || x >= self.width() as f32 || baseline >= self.height() as f32 {
      self.skip_label(text, LabelSkipReason::OutOfBounds);
      return;
    }

    let top = (baseline - self.font_scale.y).round() as i32;
    draw_text_mut(
      &mut self.image,
      color,
      x.round() as i32,
      top,
      self.font_scale,
      font,
      &text,
    );
  }

  pub fn push_class(&mut self, class: &str) {
    self.classes.push(class.to_string());
  }

  fn skip_label(&mut self, text: String, reason: LabelSkipReason) {
    warn!("标签 '{}' 未绘制: {:?}", text, reason);
    self.skipped_labels.push(SkippedLabel { text, reason });
  }

  fn finish(self) -> Rendered {
    Rendered {
      image: self.image,
      classes: self.classes,
      skipped_labels: self.skipped_labels,
    }
  }
}

/// 标注器，持有标签字体
#[derive(Clone, Default)]
pub struct Annotator {
  font: Option<FontArc>,
}

impl Annotator {
  pub fn new(font: FontArc) -> Self {
    Self { font: Some(font) }
  }

  /// 不带字体的标注器，所有标签都会被跳过
  pub fn without_font() -> Self {
    Self { font: None }
  }

  pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc, RenderError> {
    let data = std::fs::read(path)?;
    Ok(FontArc::try_from_vec(data)?)
  }

  /// 在输入图像的副本上绘制结果，输入图像保持不变
  pub fn render(
    &self,
    image: &RgbImage,
    result: &DetectionResult,
    command: VisionCommand,
  ) -> Result<Rendered, RenderError> {
    let mut canvas = Canvas::new(image.clone(), self.font.as_ref());

    match (command, result) {
      (VisionCommand::DetectFaces, DetectionResult::Faces(faces)) => faces.annotate(&mut canvas),
      (VisionCommand::MaskFaces, DetectionResult::Faces(faces)) => {
        FaceMask(faces).annotate(&mut canvas)
      }
      (VisionCommand::DetectProducts, DetectionResult::Products(products)) => {
        products.annotate(&mut canvas)
      }
      (VisionCommand::AnalyzePoses, DetectionResult::Poses(poses)) => poses.annotate(&mut canvas),
      (command, result) => {
        return Err(RenderError::NotDrawable {
          command,
          kind: kind_name(result),
        });
      }
    }

    Ok(canvas.finish())
  }
}

fn kind_name(result: &DetectionResult) -> &'static str {
  match result {
    DetectionResult::Faces(_) => "faces",
    DetectionResult::Products(_) => "products",
    DetectionResult::Nsfw(_) => "nsfw",
    DetectionResult::Tags(_) => "tags",
    DetectionResult::Poses(_) => "poses",
    DetectionResult::Texts(_) => "texts",
  }
}
