// 该文件是 Kanjian （看见） 项目的一部分。
// src/transport/telegram.rs - Telegram Bot API 客户端
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
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::transport::{
  ChatAction, ChatId, ChatTransport, InlineKeyboard, MessageId, TransportError, Update, User,
};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org/";

#[derive(Deserialize)]
struct ApiResponse<T> {
  ok: bool,
  result: Option<T>,
  description: Option<String>,
}

impl<T> ApiResponse<T> {
  fn into_result(self) -> Result<T, TransportError> {
    match (self.ok, self.result) {
      (true, Some(result)) => Ok(result),
      _ => Err(TransportError::Api(
        self
          .description
          .unwrap_or_else(|| "unknown Telegram API error".to_string()),
      )),
    }
  }
}

#[derive(Deserialize)]
struct SentMessage {
  message_id: MessageId,
}

#[derive(Deserialize)]
struct File {
  #[serde(default)]
  file_path: Option<String>,
}

/// 基于长轮询的 Telegram 机器人客户端
pub struct TelegramBot {
  http_client: reqwest::Client,
  api_base: Url,
  file_base: Url,
}

impl TelegramBot {
  pub fn new(token: &str) -> Result<Self, TransportError> {
    Self::with_api_url(token, DEFAULT_API_URL)
  }

  pub fn with_api_url(token: &str, api_url: &str) -> Result<Self, TransportError> {
    let root = Url::parse(api_url)?;
    Ok(Self {
      // 长轮询本身会挂起，不设置整体超时
      http_client: reqwest::Client::new(),
      // 令牌含冒号，以 ./ 开头避免被当作 scheme
      api_base: root.join(&format!("./bot{token}/"))?,
      file_base: root.join(&format!("file/bot{token}/"))?,
    })
  }

  async fn call<T: DeserializeOwned>(
    &self,
    method: &str,
    params: serde_json::Value,
  ) -> Result<T, TransportError> {
    let url = self.api_base.join(method)?;
    debug!("调用 Telegram 接口: {}", method);
    let response: ApiResponse<T> = self
      .http_client
      .post(url)
      .json(&params)
      .send()
      .await?
      .json()
      .await?;
    response.into_result()
  }

  /// 机器人自身信息，启动时用于校验令牌
  pub async fn get_me(&self) -> Result<User, TransportError> {
    self.call("getMe", json!({})).await
  }

  /// 删除 webhook，否则 getUpdates 不可用
  pub async fn delete_webhook(&self) -> Result<(), TransportError> {
    let _: bool = self.call("deleteWebhook", json!({})).await?;
    Ok(())
  }
}

#[async_trait]
impl ChatTransport for TelegramBot {
  async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
    self
      .call(
        "getUpdates",
        json!({
          "offset": offset,
          "timeout": timeout_secs,
          "allowed_updates": ["message", "callback_query"],
        }),
      )
      .await
  }

  async fn send_text(
    &self,
    chat: ChatId,
    text: &str,
    reply_to: Option<MessageId>,
    keyboard: Option<InlineKeyboard>,
  ) -> Result<MessageId, TransportError> {
    let mut params = json!({ "chat_id": chat, "text": text });
    if let Some(reply_to) = reply_to {
      params["reply_to_message_id"] = json!(reply_to);
    }
    if let Some(keyboard) = keyboard {
      params["reply_markup"] = json!(keyboard);
    }
    let sent: SentMessage = self.call("sendMessage", params).await?;
    Ok(sent.message_id)
  }

  async fn send_photo(
    &self,
    chat: ChatId,
    jpeg: Vec<u8>,
    caption: &str,
  ) -> Result<MessageId, TransportError> {
    let photo = Part::bytes(jpeg)
      .file_name("result.jpg")
      .mime_str("image/jpeg")?;
    let form = Form::new()
      .text("chat_id", chat.to_string())
      .text("caption", caption.to_string())
      .part("photo", photo);

    let url = self.api_base.join("sendPhoto")?;
    let response: ApiResponse<SentMessage> = self
      .http_client
      .post(url)
      .multipart(form)
      .send()
      .await?
      .json()
      .await?;
    Ok(response.into_result()?.message_id)
  }

  async fn edit_message_text(
    &self,
    chat: ChatId,
    message: MessageId,
    text: &str,
  ) -> Result<(), TransportError> {
    // 返回的是被编辑的消息，这里不需要
    let _: serde_json::Value = self
      .call(
        "editMessageText",
        json!({ "chat_id": chat, "message_id": message, "text": text }),
      )
      .await?;
    Ok(())
  }

  async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), TransportError> {
    let _: bool = self
      .call(
        "deleteMessage",
        json!({ "chat_id": chat, "message_id": message }),
      )
      .await?;
    Ok(())
  }

  async fn send_chat_action(&self, chat: ChatId, action: ChatAction) -> Result<(), TransportError> {
    let _: bool = self
      .call(
        "sendChatAction",
        json!({ "chat_id": chat, "action": action.as_str() }),
      )
      .await?;
    Ok(())
  }

  async fn answer_callback_query(&self, query_id: &str) -> Result<(), TransportError> {
    let _: bool = self
      .call(
        "answerCallbackQuery",
        json!({ "callback_query_id": query_id }),
      )
      .await?;
    Ok(())
  }

  async fn file_url(&self, file_id: &str) -> Result<String, TransportError> {
    let file: File = self.call("getFile", json!({ "file_id": file_id })).await?;
    let path = file
      .file_path
      .ok_or_else(|| TransportError::Api(format!("no file path for '{file_id}'")))?;
    Ok(self.file_base.join(&path)?.to_string())
  }

  async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError> {
    let response = self.http_client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
  }
}
