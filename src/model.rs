// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/model.rs - 模型
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

use crate::frame::{FrameError, InputTensor, OutputTensor};

/// 类别编号越界时使用的名称
pub const FALLBACK_LABEL: &str = "object";

pub const COCO_LABELS: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// COCO 类别名称，越界时返回 `"object"`
pub fn class_name_or_default(class_id: u32) -> &'static str {
  COCO_LABELS
    .get(class_id as usize)
    .copied()
    .unwrap_or(FALLBACK_LABEL)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, width, height]，640x640 像素坐标
}

impl Detection {
  pub fn label(&self) -> &'static str {
    class_name_or_default(self.class_id)
  }

  pub fn center(&self) -> (f32, f32) {
    let [x_min, y_min, width, height] = self.bbox;
    (x_min + width / 2.0, y_min + height / 2.0)
  }
}

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("推理后端错误: {0}")]
  BackendError(String),
  #[error("输出形状错误: {0}")]
  ShapeError(#[from] FrameError),
  #[error("输出形状不符: 期望 [1, 84, N], 实际 {0:?}")]
  UnexpectedShape(Vec<i64>),
  #[error("推理任务异常退出: {0}")]
  TaskJoinError(String),
}

/// 检测器适配器：输入一个张量，输出一个张量
#[async_trait]
pub trait Model: Send + Sync {
  async fn infer(&self, input: InputTensor) -> Result<OutputTensor, InferenceError>;
}

pub mod codec;

#[cfg(feature = "model_yolov8")]
mod yolov8;
#[cfg(feature = "model_yolov8")]
pub use self::yolov8::{BoxGeometry, Yolov8, Yolov8Builder};
