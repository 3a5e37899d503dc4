// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;
use url::Url;

use crate::{frame::PixelFrame, url_path};

/// 默认采样间隔（毫秒）
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// 视频输入可用的 URL 方案
pub const VIDEO_SCHEMES: [&str; 2] = ["video", "file"];

/// 落在时长末尾的采样点向前回退的距离（毫秒）
const TAIL_BACKOFF_MS: u64 = 1;

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::GStreamerSampler;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("无法获取绘制表面: {0}")]
  ContextUnavailable(String),
  #[error("视频加载失败: {0}")]
  MediaLoadError(String),
  #[error("采样间隔必须为正数")]
  InvalidInterval,
  #[error("不支持的视频 URI 方案: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 帧采样器：把视频解码为按时间排序的固定尺寸帧
///
/// 每次调用都重新解码，失败时不返回部分结果。
pub trait FrameSampler: Send + Sync {
  fn sample_file(&self, path: &Path, interval_ms: u64) -> Result<Vec<PixelFrame>, InputError>;

  /// 只返回序号为 `keep_stride` 整数倍的帧，附带其在完整序列中的序号
  ///
  /// 默认实现先完整采样再过滤；能跳过解码的采样器应覆盖它。
  fn sample_file_strided(
    &self,
    path: &Path,
    interval_ms: u64,
    keep_stride: usize,
  ) -> Result<Vec<(usize, PixelFrame)>, InputError> {
    let frames = self.sample_file(path, interval_ms)?;
    Ok(
      frames
        .into_iter()
        .enumerate()
        .filter(|(index, _)| index % keep_stride.max(1) == 0)
        .collect(),
    )
  }

  fn sample(&self, video: &[u8], interval_ms: u64) -> Result<Vec<PixelFrame>, InputError> {
    with_temp_file(video, |path| self.sample_file(path, interval_ms))
  }

  fn sample_strided(
    &self,
    video: &[u8],
    interval_ms: u64,
    keep_stride: usize,
  ) -> Result<Vec<(usize, PixelFrame)>, InputError> {
    with_temp_file(video, |path| {
      self.sample_file_strided(path, interval_ms, keep_stride)
    })
  }
}

/// 视频字节先写入临时文件，调用结束后删除
fn with_temp_file<T>(
  video: &[u8],
  f: impl FnOnce(&Path) -> Result<T, InputError>,
) -> Result<T, InputError> {
  use std::io::Write;

  let mut file = tempfile::NamedTempFile::new()?;
  file.write_all(video)?;
  file.flush()?;
  f(file.path())
}

/// 从 `video://` 或 `file://` URL 取出视频文件路径
pub fn video_path(url: &Url) -> Result<PathBuf, InputError> {
  if !VIDEO_SCHEMES.contains(&url.scheme()) {
    return Err(InputError::SchemeMismatch(url.scheme().to_string()));
  }
  Ok(PathBuf::from(url_path(url)))
}

/// 实际跳转的位置
///
/// 流末尾之后没有可预卷的缓冲，落在时长上（或之后）的点回退到末帧之内。
pub fn seek_position(point_ms: u64, duration_ms: u64) -> u64 {
  if duration_ms > 0 && point_ms >= duration_ms {
    duration_ms.saturating_sub(TAIL_BACKOFF_MS)
  } else {
    point_ms
  }
}

/// 采样时间点：从 0 开始，每隔 `interval_ms` 一个，包含不超过时长的最后一个
///
/// 时长为 0（或无法获取）时仍返回 t = 0 的一个采样点。
pub fn sample_points(duration_ms: u64, interval_ms: u64) -> Result<Vec<u64>, InputError> {
  if interval_ms == 0 {
    return Err(InputError::InvalidInterval);
  }

  let count = duration_ms / interval_ms + 1;
  Ok((0..count).map(|i| i * interval_ms).collect())
}
