// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/model/codec.rs - 张量编解码
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

//! 像素帧与检测器张量之间的转换。
//!
//! 分数按原始值比较，不做 sigmoid 或 softmax，检测器适配器负责保证分数在 [0, 1]。

use std::cmp::Ordering;

use tracing::debug;

use crate::{
  frame::{NchwTensor, OutputTensor, RgbaFrame},
  model::Detection,
};

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

const CANVAS_SIZE: f32 = 640.0;
const GEOMETRY_ATTRIBUTES: usize = 4;
const CLASS_NUM: usize = 80;

/// RGBA 帧转为归一化的 CHW 张量，丢弃 alpha 通道
pub fn encode<const W: u32, const H: u32>(frame: &RgbaFrame<W, H>) -> NchwTensor<W, H> {
  let plane = W as usize * H as usize;
  let mut data = vec![0f32; 3 * plane];

  for (i, pixel) in frame.as_rgba().chunks_exact(4).enumerate() {
    data[i] = pixel[0] as f32 / 255.0;
    data[plane + i] = pixel[1] as f32 / 255.0;
    data[2 * plane + i] = pixel[2] as f32 / 255.0;
  }

  NchwTensor::from_planes(data)
}

/// 解码检测器输出，每个候选框独立判断，不做 NMS
pub fn decode(output: &OutputTensor, score_threshold: f32) -> Vec<Detection> {
  let mut items = Vec::new();

  for idx in 0..output.candidates() {
    let (class_id, score) = best_class(output, idx);

    // NaN 分数同样丢弃
    if score.partial_cmp(&score_threshold) != Some(Ordering::Greater) {
      continue;
    }

    let cx = output.attribute(0, idx);
    let cy = output.attribute(1, idx);
    let w = output.attribute(2, idx);
    let h = output.attribute(3, idx);

    items.push(Detection {
      class_id,
      score,
      bbox: [
        (cx - w / 2.0) * CANVAS_SIZE,
        (cy - h / 2.0) * CANVAS_SIZE,
        w * CANVAS_SIZE,
        h * CANVAS_SIZE,
      ],
    });
  }

  debug!("检测到 {} 个物体", items.len());
  items
}

// 升序扫描，分数相同时保留较小的类别编号
fn best_class(output: &OutputTensor, idx: usize) -> (u32, f32) {
  let mut max_score = output.attribute(GEOMETRY_ATTRIBUTES, idx);
  let mut cls_idx = 0usize;
  for c in 1..CLASS_NUM {
    let score = output.attribute(GEOMETRY_ATTRIBUTES + c, idx);
    if score > max_score {
      max_score = score;
      cls_idx = c;
    }
  }
  (cls_idx as u32, max_score)
}
