// 该文件是 Kanjian （看见） 项目的一部分。
// src/file_store.rs - 文件引用存储
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
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::callback::MAX_KEY_LEN;

const SHARD_COUNT: usize = 16;
const EPOCH_LEN: usize = 4;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 短键到 Telegram file_id 的映射，进程内有效，只增不删
///
/// 键由进程随机纪元前缀和自增计数组成，重启后旧键一律失效。
pub struct FileReferenceStore {
  epoch: String,
  counter: AtomicU64,
  shards: [RwLock<HashMap<u64, String>>; SHARD_COUNT],
}

impl Default for FileReferenceStore {
  fn default() -> Self {
    Self::new()
  }
}

impl FileReferenceStore {
  pub fn new() -> Self {
    let epoch = rand::random::<u32>() as u64 % 36u64.pow(EPOCH_LEN as u32);
    Self::with_epoch(epoch)
  }

  fn with_epoch(epoch: u64) -> Self {
    let mut epoch = to_base36(epoch);
    while epoch.len() < EPOCH_LEN {
      epoch.insert(0, '0');
    }

    Self {
      epoch,
      counter: AtomicU64::new(0),
      shards: Default::default(),
    }
  }

  /// 保存 file_id，返回新分配的键
  pub fn put(&self, file_handle: impl Into<String>) -> String {
    let id = self.counter.fetch_add(1, Ordering::Relaxed);
    self.shard(id).write().insert(id, file_handle.into());

    let key = format!("{}{}", self.epoch, to_base36(id));
    debug_assert!(key.len() <= MAX_KEY_LEN);
    debug!("文件引用 {} 已登记", key);
    key
  }

  /// 按键取回 file_id，未知的键返回 None
  pub fn get(&self, key: &str) -> Option<String> {
    let id = key
      .strip_prefix(self.epoch.as_str())
      .and_then(from_base36)?;
    self.shard(id).read().get(&id).cloned()
  }

  pub fn len(&self) -> usize {
    self.shards.iter().map(|s| s.read().len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn shard(&self, id: u64) -> &RwLock<HashMap<u64, String>> {
    &self.shards[(id % SHARD_COUNT as u64) as usize]
  }
}

fn to_base36(mut value: u64) -> String {
  if value == 0 {
    return "0".to_string();
  }
  let mut digits = Vec::new();
  while value > 0 {
    digits.push(BASE36[(value % 36) as usize]);
    value /= 36;
  }
  digits.reverse();
  String::from_utf8(digits).unwrap_or_default()
}

fn from_base36(text: &str) -> Option<u64> {
  if text.is_empty() {
    return None;
  }
  // 拒绝前导零，保证键与计数一一对应
  if text.len() > 1 && text.starts_with('0') {
    return None;
  }
  u64::from_str_radix(text, 36)
    .ok()
    .filter(|_| text.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()))
}
