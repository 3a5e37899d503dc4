// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图片检测
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use shaobing::{
  FromUrl,
  input::ImageFileInput,
  model::{Model, Yolov8Builder, codec},
};
use tracing::info;

/// 单张图片检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图片
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 置信度阈值
  #[arg(long, default_value_t = codec::DEFAULT_SCORE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);

  let frame = ImageFileInput::from_url(&args.input)?.into_frame()?;
  let model = Yolov8Builder::from_url(&args.model)?.build()?;

  info!("开始推理...");
  let now = std::time::Instant::now();
  let output = model.infer(codec::encode(&frame)).await?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  let detections = codec::decode(&output, args.confidence);
  info!("检测到 {} 个目标", detections.len());
  for detection in &detections {
    let [x, y, w, h] = detection.bbox;
    info!(
      "  - {}: {:.1}% at ({:.0}, {:.0}, {:.0}x{:.0})",
      detection.label(),
      detection.score * 100.0,
      x,
      y,
      w,
      h
    );
  }

  Ok(())
}
