// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/frame.rs - RGBA 帧与张量定义
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

use thiserror::Error;

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 640;

const RGBA_CHANNELS: usize = 4;
const RGB_CHANNELS: usize = 3;

/// 每个候选框的属性数量：4 个几何值 + 80 个类别分数
pub const OUTPUT_ATTRIBUTES: usize = 84;
/// YOLOv8 在 640x640 输入下的候选框数量
pub const DEFAULT_CANDIDATES: usize = 8400;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// RGBA 像素帧，行优先，原点在左上角
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

/// 采样器输出的固定尺寸帧
pub type PixelFrame = RgbaFrame<FRAME_WIDTH, FRAME_HEIGHT>;

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbaFrame<W, H> {
  type Error = FrameError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    let expected = RGBA_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> Default for RgbaFrame<W, H> {
  fn default() -> Self {
    let size = RGBA_CHANNELS * (W as usize) * (H as usize);
    let data = vec![0u8; size].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> RgbaFrame<W, H> {
  pub fn as_rgba(&self) -> &[u8] {
    &self.data
  }

  pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
    let idx = (y * W as usize + x) * RGBA_CHANNELS;
    [
      self.data[idx],
      self.data[idx + 1],
      self.data[idx + 2],
      self.data[idx + 3],
    ]
  }
}

impl<const W: u32, const H: u32> AsMut<[u8]> for RgbaFrame<W, H> {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

/// 通道平面排列（CHW）的浮点张量，批大小固定为 1
#[derive(Debug, Clone, PartialEq)]
pub struct NchwTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

/// 检测器输入张量，形状 [1, 3, 640, 640]
pub type InputTensor = NchwTensor<FRAME_WIDTH, FRAME_HEIGHT>;

impl<const W: u32, const H: u32> TryFrom<Vec<f32>> for NchwTensor<W, H> {
  type Error = FrameError;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    let expected = RGB_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> NchwTensor<W, H> {
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, H as usize, W as usize]
  }

  pub fn plane_size(&self) -> usize {
    W as usize * H as usize
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn into_inner(self) -> Box<[f32]> {
    self.data
  }

  pub(crate) fn from_planes(data: Vec<f32>) -> Self {
    debug_assert_eq!(data.len(), RGB_CHANNELS * W as usize * H as usize);
    Self {
      data: data.into_boxed_slice(),
    }
  }
}

/// 检测器原始输出，概念形状 (84, N)
///
/// 第 `a` 个属性、第 `i` 个候选框位于 `a * N + i`。
/// 属性 0..4 为归一化的中心点与宽高，属性 4..84 为各类别分数。
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  data: Box<[f32]>,
  candidates: usize,
}

impl OutputTensor {
  pub fn new(data: Vec<f32>, candidates: usize) -> Result<Self, FrameError> {
    let expected = OUTPUT_ATTRIBUTES * candidates;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
      candidates,
    })
  }

  pub fn candidates(&self) -> usize {
    self.candidates
  }

  pub fn attribute(&self, attr: usize, candidate: usize) -> f32 {
    self.data[attr * self.candidates + candidate]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn as_mut_slice(&mut self) -> &mut [f32] {
    &mut self.data
  }
}
