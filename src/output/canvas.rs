// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/output/canvas.rs - 共享画布
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

use std::{io::Cursor, sync::Mutex};

use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{
  frame::{FRAME_HEIGHT, FRAME_WIDTH, PixelFrame},
  model::Detection,
  output::PersistenceError,
};

const BOX_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]); // 蓝色
const BOX_THICKNESS: i32 = 2;

/// 所有帧任务共用的 640x640 画布
///
/// 绘制与编码在同一把锁内完成，中间没有挂起点，
/// 因此其他任务的绘制不会混进当前帧的图像。
pub struct Canvas {
  image: Mutex<RgbaImage>,
  annotate: bool,
}

impl Canvas {
  pub fn new(annotate: bool) -> Self {
    Self {
      image: Mutex::new(RgbaImage::new(FRAME_WIDTH, FRAME_HEIGHT)),
      annotate,
    }
  }

  /// 绘制帧并编码为 PNG
  pub fn capture(
    &self,
    frame: &PixelFrame,
    detections: &[Detection],
  ) -> Result<Vec<u8>, PersistenceError> {
    let mut canvas = self
      .image
      .lock()
      .map_err(|_| PersistenceError::CanvasPoisoned)?;

    canvas.copy_from_slice(frame.as_rgba());
    if self.annotate {
      for detection in detections {
        draw_bbox(&mut canvas, &detection.bbox);
      }
    }

    let mut blob = Cursor::new(Vec::new());
    canvas.write_to(&mut blob, ImageFormat::Png)?;
    Ok(blob.into_inner())
  }
}

// bbox 为像素坐标 [x_min, y_min, width, height]
fn draw_bbox(image: &mut RgbaImage, bbox: &[f32; 4]) {
  let (w, h) = (image.width() as i32, image.height() as i32);

  let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
  let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
  let x_max = ((bbox[0] + bbox[2]).ceil() as i32).clamp(0, w - 1);
  let y_max = ((bbox[1] + bbox[3]).ceil() as i32).clamp(0, h - 1);

  for thickness in 0..BOX_THICKNESS {
    let width = x_max - x_min - 2 * thickness + 1;
    let height = y_max - y_min - 2 * thickness + 1;
    if width <= 0 || height <= 0 {
      return;
    }
    let rect = Rect::at(x_min + thickness, y_min + thickness).of_size(width as u32, height as u32);
    draw_hollow_rect_mut(image, rect, BOX_COLOR);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tagged_frame(value: u8) -> PixelFrame {
    let mut frame = PixelFrame::default();
    for px in frame.as_mut().chunks_exact_mut(4) {
      px.copy_from_slice(&[value, value, value, 255]);
    }
    frame
  }

  #[test]
  fn capture_encodes_frame_as_png() {
    let canvas = Canvas::new(false);
    let blob = canvas.capture(&tagged_frame(42), &[]).unwrap();

    let decoded = image::load_from_memory_with_format(&blob, ImageFormat::Png)
      .unwrap()
      .to_rgba8();
    assert_eq!(decoded.dimensions(), (640, 640));
    assert_eq!(decoded.get_pixel(100, 100), &Rgba([42, 42, 42, 255]));
  }

  #[test]
  fn capture_replaces_previous_drawing() {
    let canvas = Canvas::new(false);
    canvas.capture(&tagged_frame(1), &[]).unwrap();
    let blob = canvas.capture(&tagged_frame(2), &[]).unwrap();
    let decoded = image::load_from_memory(&blob).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0), &Rgba([2, 2, 2, 255]));
  }

  #[test]
  fn annotate_draws_box_outline() {
    let canvas = Canvas::new(true);
    let detection = Detection {
      class_id: 0,
      score: 0.9,
      bbox: [10.0, 20.0, 100.0, 50.0],
    };
    let blob = canvas.capture(&tagged_frame(0), &[detection]).unwrap();
    let decoded = image::load_from_memory(&blob).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(10, 20), &BOX_COLOR);
    assert_eq!(decoded.get_pixel(11, 40), &BOX_COLOR);
    assert_eq!(decoded.get_pixel(60, 45), &Rgba([0, 0, 0, 255]));
  }

  #[test]
  fn boxes_outside_canvas_are_clamped() {
    let mut image = RgbaImage::new(640, 640);
    draw_bbox(&mut image, &[-50.0, -50.0, 2000.0, 2000.0]);
    assert_eq!(image.get_pixel(0, 0), &BOX_COLOR);
    assert_eq!(image.get_pixel(639, 639), &BOX_COLOR);
  }
}
