// 该文件是 Kanjian （看见） 项目的一部分。
// src/render/text.rs - 文本类结果与图片说明
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

use crate::command::VisionCommand;
use crate::model::{DetectionResult, NsfwScores, TagResult, TextBlock};

/// 概率转百分比，保留两位小数
pub fn percent(probability: f32) -> String {
  format!("{:.2}%", probability as f64 * 100.0)
}

pub fn format_nsfw(scores: &NsfwScores) -> String {
  format!(
    "Normal: {}\nSoft: {}\nAdult: {}",
    percent(scores.normal),
    percent(scores.soft),
    percent(scores.adult)
  )
}

pub fn format_tags(tags: &TagResult) -> String {
  tags
    .labels
    .iter()
    .zip(&tags.localized)
    .map(|(label, localized)| format!("{label} ({localized})"))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn format_texts(blocks: &[TextBlock]) -> String {
  blocks
    .iter()
    .flat_map(|b| b.words.iter().map(String::as_str))
    .collect::<Vec<_>>()
    .join(", ")
}

/// 图片结果的说明文字；商品检测附带类别列表
pub fn caption(command: VisionCommand, classes: &[String]) -> String {
  if classes.is_empty() {
    format!("Process result of '{}'", command)
  } else {
    with_body(command, &classes.join("\n"))
  }
}

/// 文本类结果的回复，图片类结果返回 None
pub fn text_reply(command: VisionCommand, result: &DetectionResult) -> Option<String> {
  let body = match result {
    DetectionResult::Nsfw(scores) => format_nsfw(scores),
    DetectionResult::Tags(tags) => format_tags(tags),
    DetectionResult::Texts(blocks) => format_texts(blocks),
    _ => return None,
  };
  Some(with_body(command, &body))
}

fn with_body(command: VisionCommand, body: &str) -> String {
  format!("Process result of '{}':\n\n{}", command, body)
}
