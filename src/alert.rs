// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/alert.rs - 告警记录
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

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  model::Detection,
  output::{AlertStore, PersistenceError},
};

/// 尚未入库的告警，字段与告警服务的 JSON 保持一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
  pub timestamp: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub message: String,
  pub frame_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
  pub id: i64,
  pub timestamp: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub message: String,
  pub frame_url: String,
}

impl NewAlert {
  pub fn from_detection(detection: &Detection, frame_url: &str, now: DateTime<Utc>) -> Self {
    let label = detection.label();
    NewAlert {
      timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
      kind: label.to_string(),
      message: format!(
        "Detected a {} with {:.1}% confidence",
        label,
        detection.score * 100.0
      ),
      frame_url: frame_url.to_string(),
    }
  }

  pub fn with_id(self, id: i64) -> Alert {
    Alert {
      id,
      timestamp: self.timestamp,
      kind: self.kind,
      message: self.message,
      frame_url: self.frame_url,
    }
  }
}

/// 把检测结果写成告警，不做重试
#[derive(Clone)]
pub struct AlertEmitter {
  store: Arc<dyn AlertStore>,
}

impl AlertEmitter {
  pub fn new(store: Arc<dyn AlertStore>) -> Self {
    Self { store }
  }

  pub async fn emit(&self, detection: &Detection, frame_ref: &str) -> Result<Alert, PersistenceError> {
    let alert = NewAlert::from_detection(detection, frame_ref, Utc::now());
    debug!("创建告警: {} ({})", alert.message, alert.frame_url);
    self.store.create_alert(alert).await
  }
}
