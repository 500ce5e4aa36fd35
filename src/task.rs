// 该文件是 Kanjian （看见） 项目的一部分。
// src/task.rs - 长轮询接收循环
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

use std::{thread, time::Duration};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::transport::ChatTransport;
use crate::vision::VisionService;

/// 注册 Ctrl-C / SIGTERM 处理，收到信号后通道变为 true
pub fn shutdown_signal() -> Result<watch::Receiver<bool>, ctrlc::Error> {
  let (tx, rx) = watch::channel(false);
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(true);
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  Ok(rx)
}

/// 轮询 Telegram 更新并交给分发器
#[derive(Debug)]
pub struct PollingTask {
  interval: Duration,
  offset: i64,
}

impl PollingTask {
  pub fn new(interval: Duration) -> Self {
    Self {
      interval: interval.max(Duration::from_secs(1)),
      offset: 0,
    }
  }

  /// 下一次 getUpdates 使用的 offset
  pub fn offset(&self) -> i64 {
    self.offset
  }

  /// 运行到收到退出信号为止，不等待在途的处理单元
  pub async fn run<T, V>(
    &mut self,
    dispatcher: &Dispatcher<T, V>,
    mut shutdown: watch::Receiver<bool>,
  ) where
    T: ChatTransport + 'static,
    V: VisionService + 'static,
  {
    info!("开始接收更新，轮询间隔 {:?}", self.interval);
    while !*shutdown.borrow() {
      let polled = tokio::select! {
        polled = dispatcher
          .transport()
          .get_updates(self.offset, self.interval.as_secs()) => polled,
        _ = shutdown.changed() => break,
      };

      let updates = match polled {
        Ok(updates) => updates,
        Err(err) => {
          error!("接收更新失败: {}", err);
          tokio::select! {
            _ = tokio::time::sleep(self.interval) => continue,
            _ = shutdown.changed() => break,
          }
        }
      };

      for update in updates {
        self.offset = self.offset.max(update.update_id + 1);
        debug!("处理更新 {}", update.update_id);
        // 回调的处理单元在后台运行，这里不等待
        let _ = dispatcher.handle_update(update).await;
      }
    }
    info!("接收循环退出");
  }
}
