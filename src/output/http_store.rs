// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/output/http_store.rs - 告警服务 HTTP 存储
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

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
  Client,
  multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  alert::{Alert, NewAlert},
  output::{AlertStore, FrameStore, PersistenceError},
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Deserialize)]
struct UploadFrameResponse {
  #[serde(rename = "frameUrl")]
  frame_url: String,
}

/// 通过告警服务保存帧和告警
///
/// - `POST {base}/upload_frame`：multipart 字段 `frame`，返回 `{"frameUrl": ...}`
/// - `POST {base}/alerts`：告警 JSON，返回带 `id` 的记录
/// - `POST {base}/clear_all`：清空帧和告警
pub struct HttpStore {
  http: Client,
  base_url: String,
}

impl FromUrl for HttpStore {
  type Error = PersistenceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !Self::accepts(url) {
      return Err(PersistenceError::SchemeMismatch(url.scheme().to_string()));
    }

    let timeout = match url.query_pairs().find(|(k, _)| k == "timeout") {
      Some((_, v)) => v.parse::<u64>().map_err(|_| {
        PersistenceError::InvalidParameter(format!("timeout 需要是秒数: {}", v))
      })?,
      None => DEFAULT_TIMEOUT_SECS,
    };

    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);

    HttpStore::new(base.as_str(), Duration::from_secs(timeout))
  }
}

impl HttpStore {
  pub fn accepts(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
  }

  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PersistenceError> {
    let http = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }

  fn endpoint(&self, route: &str) -> String {
    format!("{}/{}", self.base_url, route)
  }
}

#[async_trait]
impl FrameStore for HttpStore {
  async fn store_frame(
    &self,
    blob: Vec<u8>,
    suggested_name: &str,
  ) -> Result<String, PersistenceError> {
    let part = Part::bytes(blob)
      .file_name(suggested_name.to_string())
      .mime_str("image/png")?;
    let form = Form::new().part("frame", part);

    let response: UploadFrameResponse = self
      .http
      .post(self.endpoint("upload_frame"))
      .multipart(form)
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    debug!("帧已上传: {} -> {}", suggested_name, response.frame_url);
    Ok(response.frame_url)
  }

  async fn clear_frames(&self) -> Result<(), PersistenceError> {
    self.clear_all().await
  }
}

#[async_trait]
impl AlertStore for HttpStore {
  async fn create_alert(&self, alert: NewAlert) -> Result<Alert, PersistenceError> {
    let created = self
      .http
      .post(self.endpoint("alerts"))
      .json(&alert)
      .send()
      .await?
      .error_for_status()?
      .json::<Alert>()
      .await?;
    Ok(created)
  }

  async fn clear_alerts(&self) -> Result<(), PersistenceError> {
    self.clear_all().await
  }
}

impl HttpStore {
  // 服务端只有一个同时清空帧和告警的接口
  async fn clear_all(&self) -> Result<(), PersistenceError> {
    self
      .http
      .post(self.endpoint("clear_all"))
      .send()
      .await?
      .error_for_status()?;
    info!("已清空告警服务: {}", self.base_url);
    Ok(())
  }
}
