// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Parser;
use url::Url;

/// Shaobing 视频检测告警参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型，例如 yolov8:///models/yolov8n.onnx?geometry=pixel
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 视频文件，例如 video:///data/clip.mp4
  #[arg(long, value_name = "VIDEO")]
  pub input: Url,

  /// 帧图像存储
  /// 支持格式:
  /// - 本地目录: folder:///var/lib/shaobing/frames
  /// - 告警服务: http://localhost:5000
  #[arg(long, value_name = "STORE")]
  pub frames: Url,

  /// 告警存储
  /// 支持格式:
  /// - 本地文件: jsonl:///var/lib/shaobing/alerts.jsonl
  /// - 告警服务: http://localhost:5000
  #[arg(long, value_name = "STORE")]
  pub alerts: Url,

  /// 采样间隔（毫秒）
  #[arg(long, default_value_t = shaobing::input::DEFAULT_INTERVAL_MS, value_name = "MS")]
  pub interval: u64,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = shaobing::model::codec::DEFAULT_SCORE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 每批并发处理的帧数
  #[arg(long, default_value_t = shaobing::task::DEFAULT_BATCH_SIZE, value_name = "COUNT")]
  pub batch_size: usize,

  /// 单帧处理超时（秒），不设置则不限制
  #[arg(long, value_name = "SECONDS")]
  pub frame_timeout: Option<u64>,

  /// 在保存的帧上绘制检测框
  #[arg(long)]
  pub annotate: bool,

  /// 处理前清空已有的帧和告警
  #[arg(long)]
  pub clear: bool,
}
