// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/task.rs - 检测任务编排
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

use std::{path::Path, sync::Arc, time::Duration};

use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  alert::AlertEmitter,
  frame::PixelFrame,
  input::{DEFAULT_INTERVAL_MS, FrameSampler, InputError},
  model::{
    InferenceError, Model,
    codec::{self, DEFAULT_SCORE_THRESHOLD},
  },
  output::{AlertStore, FrameStore, PersistenceError, canvas::Canvas},
};

pub const DEFAULT_BATCH_SIZE: usize = 5;
/// 只处理序号为该值整数倍的采样帧
pub const DEFAULT_KEEP_STRIDE: usize = 2;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub interval_ms: u64,
  pub score_threshold: f32,
  pub batch_size: usize,
  pub keep_stride: usize,
  pub frame_timeout: Option<Duration>,
  pub annotate: bool,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      interval_ms: DEFAULT_INTERVAL_MS,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      batch_size: DEFAULT_BATCH_SIZE,
      keep_stride: DEFAULT_KEEP_STRIDE,
      frame_timeout: None,
      annotate: false,
    }
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("采样失败: {0}")]
  SampleError(#[from] InputError),
  #[error("后台任务异常退出: {0}")]
  TaskJoinError(String),
  #[error("配置错误: {0}")]
  InvalidConfig(String),
}

// 单帧失败只影响该帧
#[derive(Error, Debug)]
enum FrameTaskError {
  #[error("推理失败: {0}")]
  Inference(#[from] InferenceError),
  #[error("保存失败: {0}")]
  Persistence(#[from] PersistenceError),
  #[error("处理超时 ({0:?})")]
  Timeout(Duration),
  #[error("后台任务异常退出: {0}")]
  TaskJoinError(String),
}

/// 每个帧任务共享的资源，每次 `process` 调用创建一次
struct FrameContext {
  canvas: Arc<Canvas>,
  model: Arc<dyn Model>,
  frame_store: Arc<dyn FrameStore>,
  emitter: AlertEmitter,
  score_threshold: f32,
}

impl FrameContext {
  async fn process_frame(&self, index: usize, frame: &PixelFrame) -> Result<usize, FrameTaskError> {
    let output = self.model.infer(codec::encode(frame)).await?;
    let detections = codec::decode(&output, self.score_threshold);
    if detections.is_empty() {
      debug!("第 {} 帧没有检测到目标", index);
      return Ok(0);
    }
    debug!("第 {} 帧检测到 {} 个目标", index, detections.len());

    let blob = {
      let canvas = self.canvas.clone();
      let frame = frame.clone();
      let detections = detections.clone();
      tokio::task::spawn_blocking(move || canvas.capture(&frame, &detections))
        .await
        .map_err(|e| FrameTaskError::TaskJoinError(e.to_string()))??
    };

    let name = format!("frame-{}-{}.png", Utc::now().timestamp_millis(), index);
    let frame_ref = self.frame_store.store_frame(blob, &name).await?;

    let mut created = 0;
    for detection in &detections {
      match self.emitter.emit(detection, &frame_ref).await {
        Ok(alert) => {
          debug!("告警 #{} 已创建: {}", alert.id, alert.message);
          created += 1;
        }
        Err(e) => {
          warn!("第 {} 帧告警创建失败，放弃该帧剩余告警: {}", index, e);
          break;
        }
      }
    }
    Ok(created)
  }
}

/// 视频检测流水线：采样、推理、保存帧、创建告警
pub struct Pipeline {
  sampler: Arc<dyn FrameSampler>,
  model: Arc<dyn Model>,
  frame_store: Arc<dyn FrameStore>,
  alert_store: Arc<dyn AlertStore>,
  config: PipelineConfig,
}

impl Pipeline {
  pub fn new(
    sampler: Arc<dyn FrameSampler>,
    model: Arc<dyn Model>,
    frame_store: Arc<dyn FrameStore>,
    alert_store: Arc<dyn AlertStore>,
  ) -> Self {
    Self {
      sampler,
      model,
      frame_store,
      alert_store,
      config: PipelineConfig::default(),
    }
  }

  pub fn with_config(mut self, config: PipelineConfig) -> Self {
    self.config = config;
    self
  }

  /// 处理一段视频，返回创建的告警数量
  ///
  /// 只有采样失败会返回错误；单帧的推理或保存失败记录日志后跳过。
  pub async fn process(&self, video: Vec<u8>) -> Result<usize, PipelineError> {
    self.validate()?;
    let sampler = self.sampler.clone();
    let (interval_ms, keep_stride) = (self.config.interval_ms, self.config.keep_stride);
    let frames = tokio::task::spawn_blocking(move || {
      sampler.sample_strided(&video, interval_ms, keep_stride)
    })
    .await
    .map_err(|e| PipelineError::TaskJoinError(e.to_string()))??;
    self.run(frames).await
  }

  pub async fn process_file<P: AsRef<Path>>(&self, path: P) -> Result<usize, PipelineError> {
    self.validate()?;
    let sampler = self.sampler.clone();
    let (interval_ms, keep_stride) = (self.config.interval_ms, self.config.keep_stride);
    let path = path.as_ref().to_path_buf();
    let frames = tokio::task::spawn_blocking(move || {
      sampler.sample_file_strided(&path, interval_ms, keep_stride)
    })
    .await
    .map_err(|e| PipelineError::TaskJoinError(e.to_string()))??;
    self.run(frames).await
  }

  fn validate(&self) -> Result<(), PipelineError> {
    if self.config.interval_ms == 0 {
      return Err(InputError::InvalidInterval.into());
    }
    if self.config.batch_size == 0 {
      return Err(PipelineError::InvalidConfig("batch_size 必须为正数".to_string()));
    }
    if self.config.keep_stride == 0 {
      return Err(PipelineError::InvalidConfig("keep_stride 必须为正数".to_string()));
    }
    Ok(())
  }

  /// `kept` 中的序号为帧在完整采样序列中的位置，均为 `keep_stride` 的整数倍
  async fn run(&self, kept: Vec<(usize, PixelFrame)>) -> Result<usize, PipelineError> {
    info!("处理 {} 帧（每 {} 个采样点取一帧）", kept.len(), self.config.keep_stride);

    let context = FrameContext {
      canvas: Arc::new(Canvas::new(self.config.annotate)),
      model: self.model.clone(),
      frame_store: self.frame_store.clone(),
      emitter: AlertEmitter::new(self.alert_store.clone()),
      score_threshold: self.config.score_threshold,
    };

    let mut created = 0;
    for (batch_index, batch) in kept.chunks(self.config.batch_size).enumerate() {
      debug!("开始第 {} 批，共 {} 帧", batch_index, batch.len());
      let tasks = batch
        .iter()
        .map(|(index, frame)| self.run_frame(&context, *index, frame));
      created += join_all(tasks).await.into_iter().sum::<usize>();
    }

    info!("处理完成，共创建 {} 条告警", created);
    Ok(created)
  }

  async fn run_frame(&self, context: &FrameContext, index: usize, frame: &PixelFrame) -> usize {
    let result = match self.config.frame_timeout {
      Some(limit) => tokio::time::timeout(limit, context.process_frame(index, frame))
        .await
        .unwrap_or_else(|_| Err(FrameTaskError::Timeout(limit))),
      None => context.process_frame(index, frame).await,
    };

    match result {
      Ok(created) => created,
      Err(e) => {
        warn!("第 {} 帧处理失败，已跳过: {}", index, e);
        0
      }
    }
  }
}
