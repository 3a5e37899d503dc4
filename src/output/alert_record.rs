// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/output/alert_record.rs - JSON Lines 告警记录
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

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, sync::Mutex};
use tracing::{info, warn};

use crate::{
  FromUrl, FromUrlWithScheme,
  alert::{Alert, NewAlert},
  output::{AlertStore, PersistenceError},
  url_path,
};

/// 每行一条告警的本地记录文件
///
/// 编号从 1 开始递增；打开已有文件时从最大编号之后继续。
pub struct JsonLinesAlertStore {
  path: PathBuf,
  // None 表示尚未读取已有记录
  next_id: Mutex<Option<i64>>,
}

impl FromUrlWithScheme for JsonLinesAlertStore {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesAlertStore {
  type Error = PersistenceError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(PersistenceError::SchemeMismatch(uri.scheme().to_string()));
    }
    Ok(JsonLinesAlertStore::new(url_path(uri)))
  }
}

impl JsonLinesAlertStore {
  pub fn new<P: AsRef<Path>>(path: P) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      next_id: Mutex::new(None),
    }
  }

  /// 读出全部告警，跳过无法解析的行
  pub async fn alerts(&self) -> Result<Vec<Alert>, PersistenceError> {
    let content = match tokio::fs::read_to_string(&self.path).await {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    let alerts = content
      .lines()
      .filter(|line| !line.trim().is_empty())
      .filter_map(|line| match serde_json::from_str::<Alert>(line) {
        Ok(alert) => Some(alert),
        Err(e) => {
          warn!("跳过无法解析的告警记录: {}", e);
          None
        }
      })
      .collect();
    Ok(alerts)
  }
}

#[async_trait]
impl AlertStore for JsonLinesAlertStore {
  async fn create_alert(&self, alert: NewAlert) -> Result<Alert, PersistenceError> {
    let mut next_id = self.next_id.lock().await;
    let id = match *next_id {
      Some(id) => id,
      None => self.alerts().await?.iter().map(|a| a.id).max().unwrap_or(0) + 1,
    };

    let alert = alert.with_id(id);
    let mut line = serde_json::to_string(&alert)?;
    line.push('\n');

    if let Some(parent) = self.path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;

    *next_id = Some(id + 1);
    Ok(alert)
  }

  async fn clear_alerts(&self) -> Result<(), PersistenceError> {
    let mut next_id = self.next_id.lock().await;
    match tokio::fs::remove_file(&self.path).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }
    *next_id = Some(1);
    info!("已清空告警记录: {}", self.path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn new_alert(kind: &str) -> NewAlert {
    NewAlert {
      timestamp: "2024-06-16T12:00:00.000Z".to_string(),
      kind: kind.to_string(),
      message: format!("Detected a {} with 90.0% confidence", kind),
      frame_url: "/frames/frame-0.png".to_string(),
    }
  }

  #[tokio::test]
  async fn ids_increase_from_one() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonLinesAlertStore::new(dir.path().join("alerts.jsonl"));

    let first = store.create_alert(new_alert("person")).await.unwrap();
    let second = store.create_alert(new_alert("dog")).await.unwrap();
    assert_eq!((first.id, second.id), (1, 2));

    let alerts = store.alerts().await.unwrap();
    assert_eq!(alerts, vec![first, second]);
  }

  #[tokio::test]
  async fn reopened_store_continues_numbering() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.jsonl");
    JsonLinesAlertStore::new(&path)
      .create_alert(new_alert("cat"))
      .await
      .unwrap();

    let reopened = JsonLinesAlertStore::new(&path);
    let alert = reopened.create_alert(new_alert("car")).await.unwrap();
    assert_eq!(alert.id, 2);
  }

  #[tokio::test]
  async fn clear_resets_records_and_numbering() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonLinesAlertStore::new(dir.path().join("alerts.jsonl"));
    store.create_alert(new_alert("person")).await.unwrap();
    store.create_alert(new_alert("person")).await.unwrap();

    store.clear_alerts().await.unwrap();
    assert!(store.alerts().await.unwrap().is_empty());
    assert_eq!(store.create_alert(new_alert("bus")).await.unwrap().id, 1);
  }

  #[tokio::test]
  async fn records_use_wire_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.jsonl");
    let store = JsonLinesAlertStore::new(&path);
    store.create_alert(new_alert("person")).await.unwrap();

    let line = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["type"], "person");
    assert_eq!(json["frame_url"], "/frames/frame-0.png");
  }
}
