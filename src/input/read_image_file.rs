// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::{ImageReader, RgbaImage, imageops::FilterType};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FRAME_HEIGHT, FRAME_WIDTH, FrameError, PixelFrame},
  url_path,
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Frame error: {0}")]
  FrameError(#[from] FrameError),
}

/// 单张图片输入，拉伸到 640x640 后作为一帧
pub struct ImageFileInput {
  image: RgbaImage,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Self::open(url_path(url))
  }
}

impl ImageFileInput {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImageFileInputError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(ImageFileInput {
      image: image.to_rgba8(),
    })
  }

  pub fn into_frame(self) -> Result<PixelFrame, ImageFileInputError> {
    image_to_frame(&self.image)
  }
}

pub(crate) fn image_to_frame(image: &RgbaImage) -> Result<PixelFrame, ImageFileInputError> {
  let resized = if image.dimensions() == (FRAME_WIDTH, FRAME_HEIGHT) {
    image.clone()
  } else {
    image::imageops::resize(image, FRAME_WIDTH, FRAME_HEIGHT, FilterType::Triangle)
  };
  Ok(PixelFrame::try_from(resized.into_raw())?)
}
