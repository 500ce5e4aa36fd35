// 该文件是 Kanjian （看见） 项目的一部分。
// src/dispatch.rs - 请求分发状态机
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

//! 收到图片时回复操作菜单，收到回调时解析命令并派生处理单元。
//!
//! 单个请求的状态：
//! `AwaitingSelection -> Processing -> Delivering -> Done | Failed`，
//! 取消时 `AwaitingSelection -> Done`。

use std::sync::Arc;

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::callback::{CallbackPayload, PayloadError};
use crate::command::{CommandRegistry, VisionCommand};
use crate::file_store::FileReferenceStore;
use crate::model::DetectionResult;
use crate::render::{Annotator, RenderError, text};
use crate::transport::{
  CallbackQuery, ChatAction, ChatId, ChatTransport, InlineKeyboard, InlineKeyboardButton, Message,
  MessageId, TransportError, Update,
};
use crate::vision::{self, Thresholds, VisionError, VisionService};

pub const MENU_PROMPT: &str = "Choose action for this image:";
pub const CANCELED: &str = "Canceled.";
pub const CANCEL_BUTTON: &str = "Cancel";
pub const JPEG_QUALITY: u8 = 90;

pub const HELP: &str = "Send any image to this bot, then select one of the following actions:

- Detect Faces
- Detect Products
- Detect NSFW
- Tag This Image
- Analyze Poses
- Extract Texts
- Mask Faces

then it will send the result message and/or image back to you.";

#[derive(Error, Debug)]
pub enum DispatchError {
  #[error("Unprocessable message.")]
  Payload(#[from] PayloadError),
  #[error("Unprocessable message.")]
  NoMenu,
  #[error("Failed to get file. The bot may have been restarted, please send the image again.")]
  StaleKey(String),
  #[error("Failed to get file from the server.")]
  Fetch(#[source] TransportError),
  #[error("{}", empty_message(.0))]
  Empty(VisionCommand),
  #[error("Failed to {}: {source}", verb(.command))]
  Vision {
    command: VisionCommand,
    #[source]
    source: VisionError,
  },
  #[error("Failed to decode image: {0}")]
  Decode(#[source] image::ImageError),
  #[error("Failed to encode image: {0}")]
  Encode(#[source] image::ImageError),
  #[error("Failed to render image: {0}")]
  Render(#[from] RenderError),
  #[error("Failed to send result: {0}")]
  Delivery(#[source] TransportError),
  #[error("Bot is shutting down, please try again later.")]
  Shutdown,
  #[error("Failed to process image: {0}")]
  Crashed(#[source] tokio::task::JoinError),
}

fn empty_message(command: &VisionCommand) -> &'static str {
  match command {
    VisionCommand::DetectFaces | VisionCommand::MaskFaces => "No face detected on this image.",
    VisionCommand::DetectProducts => "No product detected on this image.",
    VisionCommand::Tag => "Could not tag given image.",
    VisionCommand::AnalyzePoses => "No pose detected on this image.",
    VisionCommand::ExtractTexts => "No text detected on this image.",
    // 成人内容检测总有分数
    VisionCommand::DetectNsfw => "Could not detect NSFW factors from image.",
  }
}

fn verb(command: &VisionCommand) -> &'static str {
  match command {
    VisionCommand::DetectFaces | VisionCommand::MaskFaces => "detect faces",
    VisionCommand::DetectProducts => "detect products",
    VisionCommand::DetectNsfw => "detect NSFW factors from image",
    VisionCommand::Tag => "tag image",
    VisionCommand::AnalyzePoses => "analyze poses",
    VisionCommand::ExtractTexts => "detect texts",
  }
}

/// 单个请求的状态
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
  AwaitingSelection,
  Processing(VisionCommand),
  Delivering(VisionCommand),
  Done,
  /// 携带发送给用户的错误信息
  Failed(String),
}

impl RequestState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, RequestState::Done | RequestState::Failed(_))
  }

  pub fn can_advance_to(&self, next: &RequestState) -> bool {
    use RequestState::*;
    match (self, next) {
      (AwaitingSelection, Processing(_) | Done | Failed(_)) => true,
      (Processing(a), Delivering(b)) => a == b,
      (Processing(_), Failed(_)) => true,
      (Delivering(_), Done | Failed(_)) => true,
      _ => false,
    }
  }

  /// 非法转换保持原状态并告警
  pub fn advance(&mut self, next: RequestState) {
    if self.can_advance_to(&next) {
      debug!("请求状态: {:?} -> {:?}", self, next);
      *self = next;
    } else {
      warn!("非法的请求状态转换: {:?} -> {:?}", self, next);
    }
  }
}

/// 回调处理的结果，处理单元在后台运行时返回其句柄
#[derive(Debug)]
pub enum CallbackOutcome {
  Finished(RequestState),
  Spawned(JoinHandle<RequestState>),
}

impl CallbackOutcome {
  /// 等待请求进入终态
  pub async fn settle(self) -> RequestState {
    match self {
      CallbackOutcome::Finished(state) => state,
      CallbackOutcome::Spawned(handle) => match handle.await {
        Ok(state) => state,
        Err(err) => {
          error!("处理单元异常退出: {}", err);
          RequestState::Failed(err.to_string())
        }
      },
    }
  }
}

pub struct Dispatcher<T, V> {
  transport: Arc<T>,
  vision: Arc<V>,
  registry: CommandRegistry,
  files: Arc<FileReferenceStore>,
  annotator: Annotator,
  thresholds: Thresholds,
  permits: Arc<Semaphore>,
}

impl<T, V> Dispatcher<T, V>
where
  T: ChatTransport + 'static,
  V: VisionService + 'static,
{
  pub fn new(
    transport: Arc<T>,
    vision: Arc<V>,
    registry: CommandRegistry,
    annotator: Annotator,
    max_concurrent_requests: usize,
  ) -> Self {
    Self {
      transport,
      vision,
      registry,
      files: Arc::new(FileReferenceStore::new()),
      annotator,
      thresholds: Thresholds::default(),
      permits: Arc::new(Semaphore::new(max_concurrent_requests)),
    }
  }

  pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
    self.thresholds = thresholds;
    self
  }

  pub fn transport(&self) -> &Arc<T> {
    &self.transport
  }

  pub fn files(&self) -> &FileReferenceStore {
    &self.files
  }

  /// 处理一条更新，错误只记录不上抛
  pub async fn handle_update(&self, update: Update) -> Option<CallbackOutcome> {
    if let Some(message) = update.message {
      if let Err(err) = self.handle_message(&message).await {
        error!("处理消息 {} 失败: {}", message.message_id, err);
      }
      None
    } else if let Some(query) = update.callback_query {
      Some(self.handle_callback(query).await)
    } else {
      debug!("忽略更新 {}", update.update_id);
      None
    }
  }

  /// 图片消息回复操作菜单，其余消息回复帮助
  pub async fn handle_message(&self, message: &Message) -> Result<(), DispatchError> {
    let chat = message.chat.id;
    let (text, keyboard) = match message.image_file_id() {
      Some(file_id) => {
        let key = self.files.put(file_id);
        debug!("文件 {} 分配键 {}", file_id, key);
        (MENU_PROMPT, Some(self.menu(&key)?))
      }
      None => (HELP, None),
    };

    self
      .transport
      .send_text(chat, text, Some(message.message_id), keyboard)
      .await
      .map_err(DispatchError::Delivery)?;
    Ok(())
  }

  fn menu(&self, key: &str) -> Result<InlineKeyboard, PayloadError> {
    let mut rows = Vec::with_capacity(VisionCommand::COUNT + 1);
    for command in VisionCommand::ALL {
      let payload = CallbackPayload::Command {
        command,
        key: key.to_string(),
      };
      rows.push(vec![InlineKeyboardButton {
        text: command.label().to_string(),
        callback_data: payload.encode(&self.registry)?,
      }]);
    }
    rows.push(vec![InlineKeyboardButton {
      text: CANCEL_BUTTON.to_string(),
      callback_data: CallbackPayload::Cancel.encode(&self.registry)?,
    }]);
    Ok(InlineKeyboard {
      inline_keyboard: rows,
    })
  }

  pub async fn handle_callback(&self, query: CallbackQuery) -> CallbackOutcome {
    let mut state = RequestState::AwaitingSelection;

    if let Err(err) = self.transport.answer_callback_query(&query.id).await {
      warn!("应答回调 {} 失败: {}", query.id, err);
    }

    let Some(menu) = query.message.as_ref() else {
      warn!("回调 {} 没有关联的菜单消息", query.id);
      state.advance(RequestState::Failed(DispatchError::NoMenu.to_string()));
      return CallbackOutcome::Finished(state);
    };
    let (chat, menu_id) = (menu.chat.id, menu.message_id);

    let payload = query
      .data
      .as_deref()
      .ok_or(PayloadError::Empty)
      .and_then(|data| CallbackPayload::decode(&self.registry, data));

    let (command, file_handle) = match payload {
      Ok(CallbackPayload::Cancel) => {
        self.edit_menu(chat, menu_id, CANCELED).await;
        state.advance(RequestState::Done);
        return CallbackOutcome::Finished(state);
      }
      Ok(CallbackPayload::Command { command, key }) => match self.files.get(&key) {
        Some(handle) => (command, handle),
        None => {
          let err = DispatchError::StaleKey(key);
          warn!("找不到文件引用，可能是机器人重启过: {:?}", err);
          return self.fail_at_menu(state, chat, menu_id, err).await;
        }
      },
      Err(err) => {
        warn!("无法解析回调数据 {:?}: {}", query.data, err);
        return self
          .fail_at_menu(state, chat, menu_id, DispatchError::from(err))
          .await;
      }
    };

    self
      .edit_menu(
        chat,
        menu_id,
        &format!("Processing '{}' on received image...", command),
      )
      .await;
    state.advance(RequestState::Processing(command));

    let unit = ProcessingUnit {
      transport: Arc::clone(&self.transport),
      vision: Arc::clone(&self.vision),
      annotator: self.annotator.clone(),
      thresholds: self.thresholds,
      chat,
      menu: menu_id,
      file_handle,
      command,
      username: query.from.display_name().to_string(),
    };
    let permits = Arc::clone(&self.permits);
    CallbackOutcome::Spawned(tokio::spawn(unit.run(permits, state)))
  }

  async fn fail_at_menu(
    &self,
    mut state: RequestState,
    chat: ChatId,
    menu: MessageId,
    err: DispatchError,
  ) -> CallbackOutcome {
    let message = err.to_string();
    self.edit_menu(chat, menu, &message).await;
    state.advance(RequestState::Failed(message));
    CallbackOutcome::Finished(state)
  }

  async fn edit_menu(&self, chat: ChatId, menu: MessageId, text: &str) {
    if let Err(err) = self.transport.edit_message_text(chat, menu, text).await {
      error!("编辑菜单消息失败: {}", err);
    }
  }
}

/// 一次分析请求的后台处理单元
struct ProcessingUnit<T, V> {
  transport: Arc<T>,
  vision: Arc<V>,
  annotator: Annotator,
  thresholds: Thresholds,
  chat: ChatId,
  menu: MessageId,
  file_handle: String,
  command: VisionCommand,
  username: String,
}

impl<T, V> ProcessingUnit<T, V>
where
  T: ChatTransport + 'static,
  V: VisionService + 'static,
{
  async fn run(self, permits: Arc<Semaphore>, state: RequestState) -> RequestState {
    let unit = Arc::new(self);
    let (mut state, result) = match permits.acquire_owned().await {
      Ok(_permit) => {
        // 处理过程在独立任务中运行，panic 也能得到回复
        let worker = Arc::clone(&unit);
        let fallback = state.clone();
        let processing = tokio::spawn(async move {
          let mut state = state;
          let result = worker.process(&mut state).await;
          (state, result)
        });
        match processing.await {
          Ok(outcome) => outcome,
          Err(err) => (fallback, Err(DispatchError::Crashed(err))),
        }
      }
      Err(err) => {
        error!("并发许可不可用: {}", err);
        (state, Err(DispatchError::Shutdown))
      }
    };

    if let Err(err) = unit.transport.delete_message(unit.chat, unit.menu).await {
      warn!("删除菜单消息失败: {}", err);
    }

    match result {
      Ok(()) => {
        info!("'{}' 处理完成", unit.command);
        state.advance(RequestState::Done);
      }
      Err(err) => {
        let message = err.to_string();
        error!(
          username = %unit.username,
          command = %unit.command,
          "处理失败: {:?}",
          err
        );
        if let Err(err) = unit.transport.send_text(unit.chat, &message, None, None).await {
          error!("发送错误消息失败: {}", err);
        }
        state.advance(RequestState::Failed(message));
      }
    }
    state
  }

  async fn process(&self, state: &mut RequestState) -> Result<(), DispatchError> {
    self.chat_action(ChatAction::Typing).await;

    let file_url = self
      .transport
      .file_url(&self.file_handle)
      .await
      .map_err(DispatchError::Fetch)?;
    info!(
      username = %self.username,
      file_url = %file_url,
      command = %self.command,
      "开始处理请求"
    );
    let bytes = self
      .transport
      .download(&file_url)
      .await
      .map_err(DispatchError::Fetch)?;

    let now = std::time::Instant::now();
    let result = vision::analyze(self.vision.as_ref(), self.command, &bytes, self.thresholds)
      .await
      .map_err(|source| DispatchError::Vision {
        command: self.command,
        source,
      })?;
    info!(
      "'{}' 分析完成，{} 个结果，耗时: {:.2?}",
      self.command,
      result.entity_count(),
      now.elapsed()
    );
    if result.is_empty() {
      return Err(DispatchError::Empty(self.command));
    }

    if !self.command.produces_image() {
      state.advance(RequestState::Delivering(self.command));
      let reply = text::text_reply(self.command, &result)
        .ok_or(RenderError::NotDrawable {
          command: self.command,
          kind: "image",
        })?;
      self
        .transport
        .send_text(self.chat, &reply, None, None)
        .await
        .map_err(DispatchError::Delivery)?;
      return Ok(());
    }

    let annotator = self.annotator.clone();
    let command = self.command;
    let (jpeg, classes) =
      tokio::task::spawn_blocking(move || annotate_jpeg(&annotator, &bytes, &result, command))
        .await
        .map_err(DispatchError::Crashed)??;
    state.advance(RequestState::Delivering(self.command));

    self.chat_action(ChatAction::UploadPhoto).await;
    let caption = text::caption(self.command, &classes);
    self
      .transport
      .send_photo(self.chat, jpeg, &caption)
      .await
      .map_err(DispatchError::Delivery)?;
    Ok(())
  }

  async fn chat_action(&self, action: ChatAction) {
    if let Err(err) = self.transport.send_chat_action(self.chat, action).await {
      debug!("发送 {} 状态失败: {}", action.as_str(), err);
    }
  }
}

/// 解码、标注并编码为 JPEG，返回图片和商品类别
fn annotate_jpeg(
  annotator: &Annotator,
  bytes: &[u8],
  result: &DetectionResult,
  command: VisionCommand,
) -> Result<(Vec<u8>, Vec<String>), DispatchError> {
  let now = std::time::Instant::now();
  let image = image::load_from_memory(bytes)
    .map_err(DispatchError::Decode)?
    .to_rgb8();
  let rendered = annotator.render(&image, result, command)?;
  if !rendered.is_complete() {
    debug!("{} 个标签未绘制", rendered.skipped_labels.len());
  }
  let jpeg = encode_jpeg(&rendered.image).map_err(DispatchError::Encode)?;
  debug!("标注完成，耗时: {:.2?}", now.elapsed());
  Ok((jpeg, rendered.classes))
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
  let mut buffer = Vec::new();
  image.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY))?;
  Ok(buffer)
}
