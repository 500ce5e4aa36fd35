// 该文件是 Kanjian （看见） 项目的一部分。
// src/logging.rs - 日志初始化与 Loggly 转发
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

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt as tracing_fmt};
use url::Url;

pub const APP_NAME: &str = "Kanjian";
pub const LOGGLY_INPUT_URL: &str = "https://logs-01.loggly.com/inputs/";

/// 发往 Loggly 的一条日志
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogEntry {
  pub app: &'static str,
  pub severity: &'static str,
  pub timestamp: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub message: String,
  #[serde(skip_serializing_if = "Map::is_empty")]
  pub obj: Map<String, Value>,
}

fn severity(level: &Level) -> &'static str {
  match *level {
    Level::ERROR => "Error",
    Level::WARN => "Warning",
    Level::INFO => "Log",
    _ => "Verbose",
  }
}

/// 收集事件字段，message 单独存放
#[derive(Default)]
struct JsonVisitor {
  message: String,
  fields: Map<String, Value>,
}

impl JsonVisitor {
  fn insert(&mut self, field: &Field, value: Value) {
    if field.name() == "message" {
      self.message = match value {
        Value::String(s) => s,
        other => other.to_string(),
      };
    } else {
      self.fields.insert(field.name().to_string(), value);
    }
  }
}

impl Visit for JsonVisitor {
  fn record_str(&mut self, field: &Field, value: &str) {
    self.insert(field, Value::from(value));
  }

  fn record_i64(&mut self, field: &Field, value: i64) {
    self.insert(field, Value::from(value));
  }

  fn record_u64(&mut self, field: &Field, value: u64) {
    self.insert(field, Value::from(value));
  }

  fn record_f64(&mut self, field: &Field, value: f64) {
    self.insert(field, Value::from(value));
  }

  fn record_bool(&mut self, field: &Field, value: bool) {
    self.insert(field, Value::from(value));
  }

  fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
    self.insert(field, Value::from(format!("{:?}", value)));
  }
}

/// 把事件转成 JSON 交给后台任务上传
pub struct LogglyLayer {
  sender: mpsc::UnboundedSender<LogEntry>,
}

impl LogglyLayer {
  pub fn new(sender: mpsc::UnboundedSender<LogEntry>) -> Self {
    Self { sender }
  }

  /// 创建层并在当前 tokio 运行时上启动上传任务
  pub fn spawn(token: &str) -> Result<(Self, JoinHandle<()>), url::ParseError> {
    let endpoint = Url::parse(LOGGLY_INPUT_URL)?.join(&format!("{token}/tag/http/"))?;
    let (sender, receiver) = mpsc::unbounded_channel();
    let worker = tokio::spawn(upload(endpoint, receiver));
    Ok((Self::new(sender), worker))
  }
}

impl<S: Subscriber> Layer<S> for LogglyLayer {
  fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
    let metadata = event.metadata();
    // 只转发本项目的日志，上传任务自身除外
    let target = metadata.target();
    if !target.starts_with(env!("CARGO_CRATE_NAME")) || target.starts_with(module_path!()) {
      return;
    }

    let mut visitor = JsonVisitor::default();
    event.record(&mut visitor);
    let entry = LogEntry {
      app: APP_NAME,
      severity: severity(metadata.level()),
      timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
      message: visitor.message,
      obj: visitor.fields,
    };
    // 上传任务已退出时丢弃
    let _ = self.sender.send(entry);
  }
}

async fn upload(endpoint: Url, mut receiver: mpsc::UnboundedReceiver<LogEntry>) {
  let client = reqwest::Client::new();
  while let Some(entry) = receiver.recv().await {
    let result = client
      .post(endpoint.clone())
      .json(&entry)
      .send()
      .await
      .and_then(|response| response.error_for_status());
    if let Err(err) = result {
      warn!("Loggly 日志上传失败: {}", err);
    }
  }
}

/// 初始化全局日志；给出 Loggly 令牌时需在 tokio 运行时内调用
pub fn init(verbose: bool, loggly_token: Option<&str>) -> Result<(), url::ParseError> {
  let level = if verbose {
    LevelFilter::DEBUG
  } else {
    LevelFilter::INFO
  };

  let loggly = match loggly_token {
    Some(token) => Some(LogglyLayer::spawn(token)?.0),
    None => None,
  };

  tracing_subscriber::registry()
    .with(tracing_fmt::layer())
    .with(loggly)
    .with(level)
    .init();
  Ok(())
}
