// 该文件是 Kanjian （看见） 项目的一部分。
// src/command.rs - 视觉命令与回调令牌注册表
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

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// 命令令牌的固定长度（字节），比取消令牌长，二者不会混淆
pub const TOKEN_WIDTH: usize = 2;

/// 支持的视觉分析命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisionCommand {
  DetectFaces,
  DetectProducts,
  DetectNsfw,
  Tag,
  AnalyzePoses,
  ExtractTexts,
  /// 复用人脸检测结果，打马赛克
  MaskFaces,
}

impl VisionCommand {
  pub const COUNT: usize = 7;

  /// 菜单中的展示顺序
  pub const ALL: [VisionCommand; Self::COUNT] = [
    VisionCommand::DetectFaces,
    VisionCommand::DetectProducts,
    VisionCommand::DetectNsfw,
    VisionCommand::Tag,
    VisionCommand::AnalyzePoses,
    VisionCommand::ExtractTexts,
    VisionCommand::MaskFaces,
  ];

  pub fn label(self) -> &'static str {
    match self {
      VisionCommand::DetectFaces => "Detect Faces",
      VisionCommand::DetectProducts => "Detect Products",
      VisionCommand::DetectNsfw => "Detect NSFW",
      VisionCommand::Tag => "Tag This Image",
      VisionCommand::AnalyzePoses => "Analyze Poses",
      VisionCommand::ExtractTexts => "Extract Texts",
      VisionCommand::MaskFaces => "Mask Faces",
    }
  }

  pub fn default_token(self) -> &'static str {
    match self {
      VisionCommand::DetectFaces => "fd",
      VisionCommand::DetectProducts => "pd",
      VisionCommand::DetectNsfw => "nd",
      VisionCommand::Tag => "tg",
      VisionCommand::AnalyzePoses => "pa",
      VisionCommand::ExtractTexts => "te",
      VisionCommand::MaskFaces => "mf",
    }
  }

  /// 结果是否以图片形式返回
  pub fn produces_image(self) -> bool {
    matches!(
      self,
      VisionCommand::DetectFaces
        | VisionCommand::DetectProducts
        | VisionCommand::AnalyzePoses
        | VisionCommand::MaskFaces
    )
  }

  fn index(self) -> usize {
    self as usize
  }
}

impl fmt::Display for VisionCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
  #[error("命令 {first:?} 与 {second:?} 使用了相同的令牌 '{token}'")]
  DuplicateToken {
    token: String,
    first: VisionCommand,
    second: VisionCommand,
  },
  #[error("命令 {command:?} 的令牌 '{token}' 长度必须为 2")]
  InvalidWidth { command: VisionCommand, token: String },
  #[error("命令 {0:?} 未分配令牌")]
  Missing(VisionCommand),
}

/// 命令与令牌的双向映射
#[derive(Debug, Clone)]
pub struct CommandRegistry {
  by_token: HashMap<String, VisionCommand>,
  by_command: [String; VisionCommand::COUNT],
}

impl CommandRegistry {
  /// 使用默认令牌构造
  pub fn new() -> Result<Self, RegistryError> {
    Self::with_tokens(VisionCommand::ALL.map(|c| (c, c.default_token())))
  }

  /// 使用给定令牌表构造，令牌冲突或缺失时失败
  pub fn with_tokens<'a, I>(entries: I) -> Result<Self, RegistryError>
  where
    I: IntoIterator<Item = (VisionCommand, &'a str)>,
  {
    let mut by_token = HashMap::with_capacity(VisionCommand::COUNT);
    let mut by_command: [Option<String>; VisionCommand::COUNT] = Default::default();

    for (command, token) in entries {
      if token.len() != TOKEN_WIDTH || !token.is_ascii() {
        return Err(RegistryError::InvalidWidth {
          command,
          token: token.to_string(),
        });
      }
      if let Some(first) = by_token.insert(token.to_string(), command) {
        return Err(RegistryError::DuplicateToken {
          token: token.to_string(),
          first,
          second: command,
        });
      }
      by_command[command.index()] = Some(token.to_string());
    }

    if let Some(missing) = VisionCommand::ALL
      .into_iter()
      .find(|c| by_command[c.index()].is_none())
    {
      return Err(RegistryError::Missing(missing));
    }
    let by_command = by_command.map(Option::unwrap_or_default);

    Ok(Self {
      by_token,
      by_command,
    })
  }

  pub fn token(&self, command: VisionCommand) -> &str {
    &self.by_command[command.index()]
  }

  pub fn command(&self, token: &str) -> Option<VisionCommand> {
    self.by_token.get(token).copied()
  }
}
