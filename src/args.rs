// 该文件是 Kanjian （看见） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_FILE;

/// Kanjian 命令行参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 配置文件路径，默认为可执行文件旁的 config.json
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 输出调试日志，覆盖配置文件中的 is-verbose
  #[arg(long)]
  pub verbose: bool,
}

impl Args {
  pub fn config_path(&self) -> PathBuf {
    if let Some(path) = &self.config {
      return path.clone();
    }
    std::env::current_exe()
      .ok()
      .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
      .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
  }
}
