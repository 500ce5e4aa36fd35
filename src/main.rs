// 该文件是 Kanjian （看见） 项目的一部分。
// src/main.rs - 项目主程序
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

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use kanjian::args::Args;
use kanjian::command::CommandRegistry;
use kanjian::config::Config;
use kanjian::dispatch::Dispatcher;
use kanjian::logging;
use kanjian::render::Annotator;
use kanjian::task::{PollingTask, shutdown_signal};
use kanjian::transport::TelegramBot;
use kanjian::vision::KakaoVision;

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let config_path = args.config_path();
  let config = Config::load(&config_path)
    .with_context(|| format!("加载配置失败: {}", config_path.display()))?;
  logging::init(
    args.verbose || config.is_verbose,
    config.loggly_token.as_deref(),
  )?;

  info!("Kanjian 视觉机器人");
  info!("配置文件: {}", config_path.display());
  info!("字体文件: {}", config.font_path.display());
  info!("最大并发请求: {}", config.max_concurrent_requests);

  let font = Annotator::load_font(&config.font_path)
    .with_context(|| format!("加载字体失败: {}", config.font_path.display()))?;

  let bot = TelegramBot::new(&config.telegram_api_token)?;
  let me = bot.get_me().await.context("获取机器人信息失败")?;
  info!("机器人: {}", me.display_name());
  bot.delete_webhook().await.context("删除 webhook 失败")?;

  let vision = KakaoVision::new(&config.kakao_rest_api_key)?;
  let dispatcher = Dispatcher::new(
    Arc::new(bot),
    Arc::new(vision),
    CommandRegistry::new()?,
    Annotator::new(font),
    config.max_concurrent_requests,
  )
  .with_thresholds(config.thresholds());

  let shutdown = shutdown_signal()?;
  PollingTask::new(config.monitor_interval())
    .run(&dispatcher, shutdown)
    .await;

  info!("任务完成，退出");
  Ok(())
}
