// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/output/directory_record.rs - 目录帧存储
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
use chrono::{Datelike, Utc};
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{FrameStore, PersistenceError},
  url_path,
};

const DEFAULT_URL_PREFIX: &str = "/frames";

/// 按日期分目录保存帧图像：`<directory>/YYYY/MM/DD/<name>`
pub struct DirectoryFrameStore {
  directory: PathBuf,
  url_prefix: String,
}

impl FromUrlWithScheme for DirectoryFrameStore {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryFrameStore {
  type Error = PersistenceError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(PersistenceError::SchemeMismatch(uri.scheme().to_string()));
    }

    let url_prefix = uri
      .query_pairs()
      .find(|(k, _)| k == "prefix")
      .map(|(_, v)| v.trim_end_matches('/').to_string())
      .unwrap_or_else(|| DEFAULT_URL_PREFIX.to_string());

    Ok(DirectoryFrameStore::new(url_path(uri), url_prefix))
  }
}

impl DirectoryFrameStore {
  pub fn new<P: AsRef<Path>>(directory: P, url_prefix: impl Into<String>) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      url_prefix: url_prefix.into(),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }
}

// 只保留文件名部分，避免写到目录之外
fn sanitize_name(suggested_name: &str) -> Result<&str, PersistenceError> {
  Path::new(suggested_name)
    .file_name()
    .and_then(|name| name.to_str())
    .ok_or_else(|| PersistenceError::InvalidParameter(format!("无效的帧文件名: {}", suggested_name)))
}

#[async_trait]
impl FrameStore for DirectoryFrameStore {
  async fn store_frame(
    &self,
    blob: Vec<u8>,
    suggested_name: &str,
  ) -> Result<String, PersistenceError> {
    let name = sanitize_name(suggested_name)?;
    let now = Utc::now();
    let dated = format!("{}/{:02}/{:02}", now.year(), now.month(), now.day());

    let directory = self.directory.join(&dated);
    tokio::fs::create_dir_all(&directory).await?;

    let path = directory.join(name);
    tokio::fs::write(&path, &blob).await?;
    debug!("帧已保存: {} ({} 字节)", path.display(), blob.len());

    Ok(format!("{}/{}/{}", self.url_prefix, dated, name))
  }

  async fn clear_frames(&self) -> Result<(), PersistenceError> {
    let mut entries = match tokio::fs::read_dir(&self.directory).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
      Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if entry.file_type().await?.is_dir() {
        tokio::fs::remove_dir_all(&path).await?;
      } else {
        tokio::fs::remove_file(&path).await?;
      }
    }
    info!("已清空帧目录: {}", self.directory.display());
    Ok(())
  }
}
