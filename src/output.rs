// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/output.rs - 输出定义
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
use thiserror::Error;
use url::Url;

use crate::FromUrl;
#[cfg(any(feature = "directory_record", feature = "http_store"))]
use crate::FromUrlWithScheme;
use crate::alert::{Alert, NewAlert};

/// 帧图像存储：保存图像并返回可供查看的引用
#[async_trait]
pub trait FrameStore: Send + Sync {
  async fn store_frame(&self, blob: Vec<u8>, suggested_name: &str)
  -> Result<String, PersistenceError>;
  async fn clear_frames(&self) -> Result<(), PersistenceError>;
}

/// 告警存储：返回带编号的告警
#[async_trait]
pub trait AlertStore: Send + Sync {
  async fn create_alert(&self, alert: NewAlert) -> Result<Alert, PersistenceError>;
  async fn clear_alerts(&self) -> Result<(), PersistenceError>;
}

pub mod canvas;

#[cfg(feature = "directory_record")]
mod alert_record;
#[cfg(feature = "directory_record")]
pub use self::alert_record::JsonLinesAlertStore;

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::DirectoryFrameStore;

#[cfg(feature = "http_store")]
mod http_store;
#[cfg(feature = "http_store")]
pub use self::http_store::HttpStore;

#[derive(Error, Debug)]
pub enum PersistenceError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[cfg(feature = "http_store")]
  #[error("HTTP 错误: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("画布锁已损坏")]
  CanvasPoisoned,
  #[error("存储参数错误: {0}")]
  InvalidParameter(String),
}

pub enum FrameStoreWrapper {
  #[cfg(feature = "directory_record")]
  DirectoryFrameStore(DirectoryFrameStore),
  #[cfg(feature = "http_store")]
  HttpStore(HttpStore),
}

impl FromUrl for FrameStoreWrapper {
  type Error = PersistenceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "directory_record")]
    {
      if url.scheme() == DirectoryFrameStore::SCHEME {
        let store = DirectoryFrameStore::from_url(url)?;
        return Ok(FrameStoreWrapper::DirectoryFrameStore(store));
      }
    }
    #[cfg(feature = "http_store")]
    {
      if HttpStore::accepts(url) {
        return Ok(FrameStoreWrapper::HttpStore(HttpStore::from_url(url)?));
      }
    }
    Err(PersistenceError::SchemeMismatch(url.scheme().to_string()))
  }
}

#[async_trait]
impl FrameStore for FrameStoreWrapper {
  async fn store_frame(
    &self,
    blob: Vec<u8>,
    suggested_name: &str,
  ) -> Result<String, PersistenceError> {
    match self {
      #[cfg(feature = "directory_record")]
      FrameStoreWrapper::DirectoryFrameStore(store) => store.store_frame(blob, suggested_name).await,
      #[cfg(feature = "http_store")]
      FrameStoreWrapper::HttpStore(store) => store.store_frame(blob, suggested_name).await,
      #[allow(unreachable_patterns)]
      _ => {
        let _ = (blob, suggested_name);
        Err(PersistenceError::SchemeMismatch("none".to_string()))
      }
    }
  }

  async fn clear_frames(&self) -> Result<(), PersistenceError> {
    match self {
      #[cfg(feature = "directory_record")]
      FrameStoreWrapper::DirectoryFrameStore(store) => store.clear_frames().await,
      #[cfg(feature = "http_store")]
      FrameStoreWrapper::HttpStore(store) => store.clear_frames().await,
      #[allow(unreachable_patterns)]
      _ => Err(PersistenceError::SchemeMismatch("none".to_string())),
    }
  }
}

pub enum AlertStoreWrapper {
  #[cfg(feature = "directory_record")]
  JsonLinesAlertStore(JsonLinesAlertStore),
  #[cfg(feature = "http_store")]
  HttpStore(HttpStore),
}

impl FromUrl for AlertStoreWrapper {
  type Error = PersistenceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "directory_record")]
    {
      if url.scheme() == JsonLinesAlertStore::SCHEME {
        let store = JsonLinesAlertStore::from_url(url)?;
        return Ok(AlertStoreWrapper::JsonLinesAlertStore(store));
      }
    }
    #[cfg(feature = "http_store")]
    {
      if HttpStore::accepts(url) {
        return Ok(AlertStoreWrapper::HttpStore(HttpStore::from_url(url)?));
      }
    }
    Err(PersistenceError::SchemeMismatch(url.scheme().to_string()))
  }
}

#[async_trait]
impl AlertStore for AlertStoreWrapper {
  async fn create_alert(&self, alert: NewAlert) -> Result<Alert, PersistenceError> {
    match self {
      #[cfg(feature = "directory_record")]
      AlertStoreWrapper::JsonLinesAlertStore(store) => store.create_alert(alert).await,
      #[cfg(feature = "http_store")]
      AlertStoreWrapper::HttpStore(store) => store.create_alert(alert).await,
      #[allow(unreachable_patterns)]
      _ => {
        let _ = alert;
        Err(PersistenceError::SchemeMismatch("none".to_string()))
      }
    }
  }

  async fn clear_alerts(&self) -> Result<(), PersistenceError> {
    match self {
      #[cfg(feature = "directory_record")]
      AlertStoreWrapper::JsonLinesAlertStore(store) => store.clear_alerts().await,
      #[cfg(feature = "http_store")]
      AlertStoreWrapper::HttpStore(store) => store.clear_alerts().await,
      #[allow(unreachable_patterns)]
      _ => Err(PersistenceError::SchemeMismatch("none".to_string())),
    }
  }
}
