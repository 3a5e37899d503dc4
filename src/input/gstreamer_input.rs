// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频采样
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

//! # GStreamer 视频采样模块
//!
//! 按固定时间间隔从视频文件中抓取帧。管道在暂停状态下逐个时间点精确跳转，
//! 每次跳转后从 appsink 取出预卷帧：
//!
//! ```text
//! filesrc ! decodebin ! videoconvert ! videoscale add-borders=false
//!   ! video/x-raw,format=RGBA,width=640,height=640,pixel-aspect-ratio=1/1
//!   ! appsink name=sink
//! ```
//!
//! 画面被拉伸到 640x640，不保留宽高比。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## 基本用法
//!
//! ```no_run
//! use shaobing::input::{FrameSampler, GStreamerSampler};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sampler = GStreamerSampler::default();
//! let frames = sampler.sample_file("video.mp4".as_ref(), 1000)?;
//! println!("采样 {} 帧", frames.len());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tracing::{debug, info, warn};

use crate::{
  frame::{FRAME_HEIGHT, FRAME_WIDTH, PixelFrame},
  input::{FrameSampler, InputError, sample_points, seek_position},
};

const STATE_CHANGE_TIMEOUT_SECS: u64 = 10;

impl From<gst::glib::Error> for InputError {
  fn from(err: gst::glib::Error) -> Self {
    InputError::MediaLoadError(err.to_string())
  }
}

impl From<gst::glib::BoolError> for InputError {
  fn from(err: gst::glib::BoolError) -> Self {
    InputError::MediaLoadError(err.to_string())
  }
}

impl From<gst::StateChangeError> for InputError {
  fn from(err: gst::StateChangeError) -> Self {
    InputError::MediaLoadError(err.to_string())
  }
}

/// 基于 GStreamer 的帧采样器
#[derive(Debug, Clone)]
pub struct GStreamerSampler {
  state_timeout: gst::ClockTime,
}

impl Default for GStreamerSampler {
  fn default() -> Self {
    Self {
      state_timeout: gst::ClockTime::from_seconds(STATE_CHANGE_TIMEOUT_SECS),
    }
  }
}

/// 管道随作用域结束而停止
struct PausedPipeline {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
}

impl Drop for PausedPipeline {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerSampler {
  fn pipeline_description(path: &Path) -> String {
    format!(
      "filesrc location=\"{}\" ! decodebin ! videoconvert ! videoscale add-borders=false ! \
       video/x-raw,format=RGBA,width={},height={},pixel-aspect-ratio=1/1 ! \
       appsink name=sink sync=false",
      path.display(),
      FRAME_WIDTH,
      FRAME_HEIGHT
    )
  }

  fn open(&self, path: &Path) -> Result<PausedPipeline, InputError> {
    gst::init()?;

    let description = Self::pipeline_description(path);
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| InputError::MediaLoadError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or_else(|| InputError::ContextUnavailable("Failed to get appsink element".to_string()))?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| {
        InputError::ContextUnavailable("Failed to convert element to appsink".to_string())
      })?;

    let opened = PausedPipeline { pipeline, appsink };
    opened.pipeline.set_state(gst::State::Paused)?;
    self.wait_for_preroll(&opened.pipeline)?;

    Ok(opened)
  }

  fn wait_for_preroll(&self, pipeline: &gst::Pipeline) -> Result<(), InputError> {
    let (result, current, _pending) = pipeline.state(self.state_timeout);
    result?;
    if current != gst::State::Paused {
      return Err(InputError::MediaLoadError(format!(
        "管道未能进入暂停状态: {:?}",
        current
      )));
    }
    Ok(())
  }

  fn duration_ms(pipeline: &gst::Pipeline) -> u64 {
    match pipeline.query_duration::<gst::ClockTime>() {
      Some(duration) => duration.mseconds(),
      None => {
        warn!("无法获取视频时长，只采样第一帧");
        0
      }
    }
  }

  fn capture_at(&self, opened: &PausedPipeline, position_ms: u64) -> Result<PixelFrame, InputError> {
    opened.pipeline.seek_simple(
      gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
      gst::ClockTime::from_mseconds(position_ms),
    )?;
    self.wait_for_preroll(&opened.pipeline)?;

    let sample = opened.appsink.pull_preroll()?;
    convert_sample_to_rgba(sample)
  }
}

impl FrameSampler for GStreamerSampler {
  fn sample_file(&self, path: &Path, interval_ms: u64) -> Result<Vec<PixelFrame>, InputError> {
    let frames = self.sample_file_strided(path, interval_ms, 1)?;
    Ok(frames.into_iter().map(|(_, frame)| frame).collect())
  }

  /// 只对保留的采样点跳转解码，其余采样点不产生帧
  fn sample_file_strided(
    &self,
    path: &Path,
    interval_ms: u64,
    keep_stride: usize,
  ) -> Result<Vec<(usize, PixelFrame)>, InputError> {
    if interval_ms == 0 {
      return Err(InputError::InvalidInterval);
    }
    let keep_stride = keep_stride.max(1);

    let opened = self.open(path)?;
    let duration_ms = Self::duration_ms(&opened.pipeline);
    let points = sample_points(duration_ms, interval_ms)?;
    info!(
      "视频时长 {}ms, 采样间隔 {}ms, 共 {} 个采样点, 解码其中每 {} 个的第一个",
      duration_ms,
      interval_ms,
      points.len(),
      keep_stride
    );

    let mut frames: Vec<(usize, PixelFrame)> = Vec::with_capacity(points.len() / keep_stride + 1);
    for (index, point_ms) in points.into_iter().enumerate() {
      if index % keep_stride != 0 {
        continue;
      }
      let position_ms = seek_position(point_ms, duration_ms);
      debug!("跳转到 {}ms", position_ms);
      match self.capture_at(&opened, position_ms) {
        Ok(frame) => frames.push((index, frame)),
        // 末尾预卷到 EOS 时沿用最近一次解码出的画面
        Err(e) if opened.appsink.is_eos() && !frames.is_empty() => {
          warn!("{}ms 处已到达流末尾，沿用上一帧: {}", position_ms, e);
          if let Some((_, last)) = frames.last() {
            let last = last.clone();
            frames.push((index, last));
          }
        }
        Err(e) => return Err(e),
      }
    }

    Ok(frames)
  }
}

fn convert_sample_to_rgba(sample: gst::Sample) -> Result<PixelFrame, InputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| InputError::MediaLoadError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| InputError::MediaLoadError("No caps in sample".to_string()))?;

  let video_info = gst_video::VideoInfo::from_caps(caps)
    .map_err(|_| InputError::MediaLoadError("Failed to get video info from caps".to_string()))?;

  if video_info.format() != gst_video::VideoFormat::Rgba {
    return Err(InputError::MediaLoadError(format!(
      "Unsupported video format: {:?}",
      video_info.format()
    )));
  }

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  if width != FRAME_WIDTH as usize || height != FRAME_HEIGHT as usize {
    return Err(InputError::MediaLoadError(format!(
      "帧尺寸不符: {}x{}",
      width, height
    )));
  }

  let map = buffer
    .map_readable()
    .map_err(|e| InputError::MediaLoadError(format!("Failed to map buffer for reading: {}", e)))?;
  let data = map.as_slice();

  // 行可能带填充，按 stride 逐行拷贝
  let stride = video_info.stride()[0] as usize;
  let row_bytes = width * 4;
  if stride < row_bytes || data.len() < stride * (height - 1) + row_bytes {
    return Err(InputError::MediaLoadError(format!(
      "Buffer size mismatch: expected {} bytes, got {} bytes",
      stride * height,
      data.len()
    )));
  }

  let mut frame = PixelFrame::default();
  let frame_slice = frame.as_mut();
  for h in 0..height {
    let src = &data[h * stride..h * stride + row_bytes];
    frame_slice[h * row_bytes..(h + 1) * row_bytes].copy_from_slice(src);
  }

  Ok(frame)
}
