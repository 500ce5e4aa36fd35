// 该文件是 Kanjian （看见） 项目的一部分。
// src/transport.rs - 聊天传输层
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
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod telegram;
pub use self::telegram::TelegramBot;

pub type ChatId = i64;
pub type MessageId = i64;

#[derive(Error, Debug)]
pub enum TransportError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("{0}")]
  Api(String),
  #[error("invalid url: {0}")]
  Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct User {
  pub id: i64,
  pub first_name: String,
  #[serde(default)]
  pub username: Option<String>,
}

impl User {
  /// 有用户名用用户名，否则用名字
  pub fn display_name(&self) -> &str {
    self.username.as_deref().unwrap_or(&self.first_name)
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Chat {
  pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PhotoSize {
  pub file_id: String,
  pub width: u32,
  pub height: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Document {
  pub file_id: String,
  #[serde(default)]
  pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Message {
  pub message_id: MessageId,
  pub chat: Chat,
  #[serde(default)]
  pub from: Option<User>,
  #[serde(default)]
  pub text: Option<String>,
  #[serde(default)]
  pub photo: Option<Vec<PhotoSize>>,
  #[serde(default)]
  pub document: Option<Document>,
}

impl Message {
  /// 消息携带的图片 file_id：照片取面积最大的尺寸，文档需为 image/* 类型
  pub fn image_file_id(&self) -> Option<&str> {
    if let Some(largest) = self
      .photo
      .as_deref()
      .and_then(|sizes| sizes.iter().max_by_key(|p| p.width as u64 * p.height as u64))
    {
      return Some(&largest.file_id);
    }

    self
      .document
      .as_ref()
      .filter(|d| {
        d.mime_type
          .as_deref()
          .is_some_and(|m| m.starts_with("image/"))
      })
      .map(|d| d.file_id.as_str())
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CallbackQuery {
  pub id: String,
  pub from: User,
  #[serde(default)]
  pub message: Option<Message>,
  #[serde(default)]
  pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Update {
  pub update_id: i64,
  #[serde(default)]
  pub message: Option<Message>,
  #[serde(default)]
  pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InlineKeyboardButton {
  pub text: String,
  pub callback_data: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct InlineKeyboard {
  pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
  Typing,
  UploadPhoto,
}

impl ChatAction {
  pub fn as_str(self) -> &'static str {
    match self {
      ChatAction::Typing => "typing",
      ChatAction::UploadPhoto => "upload_photo",
    }
  }
}

/// 机器人用到的聊天平台操作
#[async_trait]
pub trait ChatTransport: Send + Sync {
  async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TransportError>;

  async fn send_text(
    &self,
    chat: ChatId,
    text: &str,
    reply_to: Option<MessageId>,
    keyboard: Option<InlineKeyboard>,
  ) -> Result<MessageId, TransportError>;

  async fn send_photo(
    &self,
    chat: ChatId,
    jpeg: Vec<u8>,
    caption: &str,
  ) -> Result<MessageId, TransportError>;

  async fn edit_message_text(
    &self,
    chat: ChatId,
    message: MessageId,
    text: &str,
  ) -> Result<(), TransportError>;

  async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError>;

  async fn send_chat_action(&self, chat: ChatId, action: ChatAction) -> Result<(), TransportError>;

  async fn answer_callback_query(&self, query_id: &str) -> Result<(), TransportError>;

  /// file_id 换取可下载的 URL
  async fn file_url(&self, file_id: &str) -> Result<String, TransportError>;

  async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}
