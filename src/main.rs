// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::info;

use shaobing::{
  FromUrl,
  input::{GStreamerSampler, video_path},
  model::Yolov8Builder,
  output::{AlertStore, AlertStoreWrapper, FrameStore, FrameStoreWrapper},
  task::{Pipeline, PipelineConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型: {}", args.model);
  info!("输入视频: {}", args.input);
  info!("帧存储: {}", args.frames);
  info!("告警存储: {}", args.alerts);

  let video = video_path(&args.input)?;
  let model = Yolov8Builder::from_url(&args.model)?.build()?;
  let frame_store = FrameStoreWrapper::from_url(&args.frames)?;
  let alert_store = AlertStoreWrapper::from_url(&args.alerts)?;

  if args.clear {
    info!("清空已有的帧和告警...");
    frame_store.clear_frames().await?;
    alert_store.clear_alerts().await?;
  }

  let config = PipelineConfig {
    interval_ms: args.interval,
    score_threshold: args.confidence,
    batch_size: args.batch_size,
    frame_timeout: args.frame_timeout.map(Duration::from_secs),
    annotate: args.annotate,
    ..PipelineConfig::default()
  };

  let pipeline = Pipeline::new(
    Arc::new(GStreamerSampler::default()),
    Arc::new(model),
    Arc::new(frame_store),
    Arc::new(alert_store),
  )
  .with_config(config);

  info!("开始处理...");
  let now = std::time::Instant::now();
  let created = pipeline.process_file(&video).await?;
  info!("处理完成，耗时: {:.2?}，创建告警 {} 条", now.elapsed(), created);

  Ok(())
}
