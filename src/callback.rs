// 该文件是 Kanjian （看见） 项目的一部分。
// src/callback.rs - 回调数据编解码
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

//! 回调数据格式：`payload := CANCEL | TOKEN KEY`
//!
//! TOKEN 固定为 [`TOKEN_WIDTH`] 字节，KEY 为文件引用存储分配的键，
//! 整体长度不超过 Telegram 的 `callback_data` 上限。

use thiserror::Error;

use crate::command::{CommandRegistry, TOKEN_WIDTH, VisionCommand};

/// 取消按钮的回调数据
pub const CANCEL_PAYLOAD: &str = "x";

/// Telegram `callback_data` 的字节上限
pub const MAX_PAYLOAD_LEN: usize = 64;

/// 文件引用键可用的最大字节数
pub const MAX_KEY_LEN: usize = MAX_PAYLOAD_LEN - TOKEN_WIDTH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackPayload {
  Cancel,
  Command { command: VisionCommand, key: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
  #[error("回调数据为空")]
  Empty,
  #[error("回调数据被截断: '{0}'")]
  Truncated(String),
  #[error("未知的命令令牌: '{0}'")]
  UnknownToken(String),
  #[error("回调数据过长: {0} 字节")]
  TooLong(usize),
}

impl CallbackPayload {
  pub fn encode(&self, registry: &CommandRegistry) -> Result<String, PayloadError> {
    let payload = match self {
      CallbackPayload::Cancel => CANCEL_PAYLOAD.to_string(),
      CallbackPayload::Command { command, key } => {
        if key.is_empty() {
          return Err(PayloadError::Truncated(registry.token(*command).to_string()));
        }
        format!("{}{}", registry.token(*command), key)
      }
    };

    if payload.len() > MAX_PAYLOAD_LEN {
      return Err(PayloadError::TooLong(payload.len()));
    }
    Ok(payload)
  }

  pub fn decode(registry: &CommandRegistry, data: &str) -> Result<Self, PayloadError> {
    if data.is_empty() {
      return Err(PayloadError::Empty);
    }
    if data.len() > MAX_PAYLOAD_LEN {
      return Err(PayloadError::TooLong(data.len()));
    }
    if data == CANCEL_PAYLOAD {
      return Ok(CallbackPayload::Cancel);
    }

    // get 同时处理了多字节字符落在边界上的情况
    let (Some(token), Some(key)) = (data.get(..TOKEN_WIDTH), data.get(TOKEN_WIDTH..)) else {
      return Err(PayloadError::Truncated(data.to_string()));
    };
    let command = registry
      .command(token)
      .ok_or_else(|| PayloadError::UnknownToken(token.to_string()))?;
    if key.is_empty() {
      return Err(PayloadError::Truncated(data.to_string()));
    }

    Ok(CallbackPayload::Command {
      command,
      key: key.to_string(),
    })
  }
}
