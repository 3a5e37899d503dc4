// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 检测器
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

use std::{
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use async_trait::async_trait;
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use tokio::sync::OnceCell;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FRAME_WIDTH, InputTensor, OUTPUT_ATTRIBUTES, OutputTensor},
  model::{InferenceError, Model},
  url_path,
};

const YOLOV8_INPUT_NAME: &str = "images";
const YOLOV8_OUTPUT_NAME: &str = "output0";
const YOLOV8_INTRA_THREADS: usize = 1;
const YOLOV8_GEOMETRY_ROWS: usize = 4;

/// 模型输出的几何值坐标系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxGeometry {
  /// 640 画布像素坐标，适配器负责归一化
  Pixel,
  /// 已归一化到 [0, 1]
  Normalized,
}

impl BoxGeometry {
  fn parse(value: &str) -> Result<Self, InferenceError> {
    match value {
      "pixel" => Ok(BoxGeometry::Pixel),
      "normalized" => Ok(BoxGeometry::Normalized),
      other => Err(InferenceError::ModelPathError(format!(
        "未知的几何坐标系: {}",
        other
      ))),
    }
  }
}

pub struct Yolov8Builder {
  model_path: PathBuf,
  input_name: String,
  output_name: String,
  intra_threads: usize,
  geometry: BoxGeometry,
}

impl FromUrlWithScheme for Yolov8Builder {
  const SCHEME: &'static str = "yolov8";
}

impl FromUrl for Yolov8Builder {
  type Error = InferenceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(InferenceError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = Yolov8Builder {
      model_path: PathBuf::from(url_path(url)),
      input_name: YOLOV8_INPUT_NAME.to_string(),
      output_name: YOLOV8_OUTPUT_NAME.to_string(),
      intra_threads: YOLOV8_INTRA_THREADS,
      geometry: BoxGeometry::Pixel,
    };

    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "input" => builder.input_name = v.into_owned(),
        "output" => builder.output_name = v.into_owned(),
        "threads" => {
          builder.intra_threads = v.parse().map_err(|_| {
            InferenceError::ModelPathError(format!("线程数无效: {}", v))
          })?
        }
        "geometry" => builder.geometry = BoxGeometry::parse(&v)?,
        _ => debug!("忽略未知的模型参数: {}={}", k, v),
      }
    }

    Ok(builder)
  }
}

impl Yolov8Builder {
  /// 检查模型文件，会话在第一次推理时才创建
  pub fn build(self) -> Result<Yolov8, InferenceError> {
    let metadata = std::fs::metadata(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    Ok(Yolov8 {
      model_path: self.model_path,
      input_name: self.input_name,
      output_name: self.output_name,
      intra_threads: self.intra_threads,
      geometry: self.geometry,
      session: OnceCell::new(),
    })
  }
}

pub struct Yolov8 {
  model_path: PathBuf,
  input_name: String,
  output_name: String,
  intra_threads: usize,
  geometry: BoxGeometry,
  session: OnceCell<Arc<Mutex<Session>>>,
}

impl Yolov8 {
  async fn session(&self) -> Result<Arc<Mutex<Session>>, InferenceError> {
    self
      .session
      .get_or_try_init(|| async {
        let path = self.model_path.clone();
        let threads = self.intra_threads;
        let session = tokio::task::spawn_blocking(move || load_session(&path, threads))
          .await
          .map_err(|e| InferenceError::TaskJoinError(e.to_string()))??;
        Ok::<_, InferenceError>(Arc::new(Mutex::new(session)))
      })
      .await
      .cloned()
  }
}

fn backend_error<E: std::fmt::Display>(e: E) -> InferenceError {
  InferenceError::BackendError(e.to_string())
}

fn load_session(path: &Path, threads: usize) -> Result<Session, InferenceError> {
  info!("加载模型文件: {}", path.display());
  let session = Session::builder()
    .map_err(backend_error)?
    .with_optimization_level(GraphOptimizationLevel::Level3)
    .map_err(backend_error)?
    .with_intra_threads(threads)
    .map_err(backend_error)?
    .commit_from_file(path)
    .map_err(|e| {
      error!("模型加载失败: {}", e);
      backend_error(e)
    })?;
  info!("模型加载完成");
  Ok(session)
}

fn run_session(
  session: &Mutex<Session>,
  input_name: &str,
  output_name: &str,
  geometry: BoxGeometry,
  input: InputTensor,
) -> Result<OutputTensor, InferenceError> {
  let tensor = Tensor::from_array((input.shape(), input.into_inner())).map_err(backend_error)?;

  let mut session = session
    .lock()
    .map_err(|_| InferenceError::BackendError("模型会话锁已损坏".to_string()))?;

  debug!("执行模型推理");
  let outputs = session
    .run(ort::inputs![input_name => tensor])
    .map_err(backend_error)?;

  debug!("获取模型输出");
  let (shape, data) = named_output(outputs.get(output_name), output_name)?
    .try_extract_tensor::<f32>()
    .map_err(backend_error)?;

  let dims: Vec<i64> = shape.iter().copied().collect();
  let candidates = match dims.as_slice() {
    [1, attrs, candidates] if *attrs as usize == OUTPUT_ATTRIBUTES => *candidates as usize,
    _ => return Err(InferenceError::UnexpectedShape(dims)),
  };

  let mut output = OutputTensor::new(data.to_vec(), candidates)?;
  if geometry == BoxGeometry::Pixel {
    normalize_geometry(&mut output);
  }
  Ok(output)
}

fn named_output<V>(value: Option<V>, name: &str) -> Result<V, InferenceError> {
  value.ok_or_else(|| InferenceError::BackendError(format!("模型没有名为 {} 的输出", name)))
}

/// 将前四行几何值从 640 像素坐标缩放到 [0, 1]
fn normalize_geometry(output: &mut OutputTensor) {
  let rows = YOLOV8_GEOMETRY_ROWS * output.candidates();
  for value in &mut output.as_mut_slice()[..rows] {
    *value /= FRAME_WIDTH as f32;
  }
}

#[async_trait]
impl Model for Yolov8 {
  async fn infer(&self, input: InputTensor) -> Result<OutputTensor, InferenceError> {
    let session = self.session().await?;
    let input_name = self.input_name.clone();
    let output_name = self.output_name.clone();
    let geometry = self.geometry;

    tokio::task::spawn_blocking(move || {
      run_session(&session, &input_name, &output_name, geometry, input)
    })
    .await
    .map_err(|e| InferenceError::TaskJoinError(e.to_string()))?
  }
}
