// 该文件是 Shaobing （哨兵） 项目的一部分。
// tests/pipeline.rs - 流水线集成测试
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
  collections::HashMap,
  path::Path,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;

use shaobing::{
  alert::{Alert, NewAlert},
  frame::{InputTensor, OUTPUT_ATTRIBUTES, OutputTensor, PixelFrame},
  input::{FrameSampler, InputError},
  model::{InferenceError, Model},
  output::{AlertStore, FrameStore, PersistenceError},
  task::{Pipeline, PipelineConfig, PipelineError},
};

const CANDIDATES: usize = 8;

/// 每一帧的 R 通道写入帧序号，模型据此识别输入
struct MockSampler {
  frames: usize,
  fail: bool,
}

impl FrameSampler for MockSampler {
  fn sample_file(&self, _path: &Path, interval_ms: u64) -> Result<Vec<PixelFrame>, InputError> {
    if interval_ms == 0 {
      return Err(InputError::InvalidInterval);
    }
    if self.fail {
      return Err(InputError::MediaLoadError("broken container".to_string()));
    }
    Ok((0..self.frames).map(tagged_frame).collect())
  }
}

fn tagged_frame(tag: usize) -> PixelFrame {
  let mut frame = PixelFrame::default();
  for px in frame.as_mut().chunks_exact_mut(4) {
    px.copy_from_slice(&[tag as u8, 0, 0, 255]);
  }
  frame
}

#[derive(Clone, Copy)]
enum Behavior {
  Detect(usize),
  Fail,
  Sleep(Duration, usize),
}

struct MockModel {
  behaviors: HashMap<usize, Behavior>,
  fallback: Behavior,
  seen: Mutex<Vec<usize>>,
  in_flight: AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl MockModel {
  fn new(fallback: Behavior) -> Self {
    Self {
      behaviors: HashMap::new(),
      fallback,
      seen: Mutex::new(Vec::new()),
      in_flight: AtomicUsize::new(0),
      max_in_flight: AtomicUsize::new(0),
    }
  }

  fn on(mut self, tag: usize, behavior: Behavior) -> Self {
    self.behaviors.insert(tag, behavior);
    self
  }

  fn seen(&self) -> Vec<usize> {
    let mut seen = self.seen.lock().unwrap().clone();
    seen.sort();
    seen
  }
}

fn output_with(detections: usize) -> OutputTensor {
  let mut output = OutputTensor::new(vec![0.0; OUTPUT_ATTRIBUTES * CANDIDATES], CANDIDATES).unwrap();
  let data = output.as_mut_slice();
  for candidate in 0..detections {
    data[candidate] = 0.5; // cx
    data[CANDIDATES + candidate] = 0.5; // cy
    data[2 * CANDIDATES + candidate] = 0.1; // w
    data[3 * CANDIDATES + candidate] = 0.1; // h
    data[4 * CANDIDATES + candidate] = 0.9; // person
  }
  output
}

#[async_trait]
impl Model for MockModel {
  async fn infer(&self, input: InputTensor) -> Result<OutputTensor, InferenceError> {
    let tag = (input.as_slice()[0] * 255.0).round() as usize;
    self.seen.lock().unwrap().push(tag);

    let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(current, Ordering::SeqCst);

    let behavior = self.behaviors.get(&tag).copied().unwrap_or(self.fallback);
    let result = match behavior {
      Behavior::Detect(n) => Ok(output_with(n)),
      Behavior::Fail => Err(InferenceError::BackendError("mock failure".to_string())),
      Behavior::Sleep(duration, n) => {
        tokio::time::sleep(duration).await;
        Ok(output_with(n))
      }
    };

    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    result
  }
}

/// 只解码保留的采样点，记录实际解码的帧数
struct SkippingSampler {
  frames: usize,
  decoded: AtomicUsize,
}

impl FrameSampler for SkippingSampler {
  fn sample_file(&self, path: &Path, interval_ms: u64) -> Result<Vec<PixelFrame>, InputError> {
    let frames = self.sample_file_strided(path, interval_ms, 1)?;
    Ok(frames.into_iter().map(|(_, frame)| frame).collect())
  }

  fn sample_file_strided(
    &self,
    _path: &Path,
    _interval_ms: u64,
    keep_stride: usize,
  ) -> Result<Vec<(usize, PixelFrame)>, InputError> {
    let kept: Vec<(usize, PixelFrame)> = (0..self.frames)
      .step_by(keep_stride)
      .map(|index| (index, tagged_frame(index)))
      .collect();
    self.decoded.fetch_add(kept.len(), Ordering::SeqCst);
    Ok(kept)
  }
}

#[derive(Default)]
struct MockFrameStore {
  fail: bool,
  names: Mutex<Vec<String>>,
  // 引用 -> 解码后左上角像素的 R 值
  stored: Mutex<HashMap<String, u8>>,
}

#[async_trait]
impl FrameStore for MockFrameStore {
  async fn store_frame(&self, blob: Vec<u8>, suggested_name: &str) -> Result<String, PersistenceError> {
    let image = image::load_from_memory_with_format(&blob, image::ImageFormat::Png)?.to_rgba8();
    assert_eq!(image.dimensions(), (640, 640));
    self.names.lock().unwrap().push(suggested_name.to_string());
    if self.fail {
      return Err(PersistenceError::InvalidParameter("disk full".to_string()));
    }
    let reference = format!("/frames/{}", suggested_name);
    self
      .stored
      .lock()
      .unwrap()
      .insert(reference.clone(), image.get_pixel(0, 0)[0]);
    Ok(reference)
  }

  async fn clear_frames(&self) -> Result<(), PersistenceError> {
    self.names.lock().unwrap().clear();
    Ok(())
  }
}

#[derive(Default)]
struct MockAlertStore {
  capacity: Option<usize>,
  alerts: Mutex<Vec<Alert>>,
}

#[async_trait]
impl AlertStore for MockAlertStore {
  async fn create_alert(&self, alert: NewAlert) -> Result<Alert, PersistenceError> {
    let mut alerts = self.alerts.lock().unwrap();
    if self.capacity.is_some_and(|capacity| alerts.len() >= capacity) {
      return Err(PersistenceError::InvalidParameter("alert table full".to_string()));
    }
    let alert = alert.with_id(alerts.len() as i64 + 1);
    alerts.push(alert.clone());
    Ok(alert)
  }

  async fn clear_alerts(&self) -> Result<(), PersistenceError> {
    self.alerts.lock().unwrap().clear();
    Ok(())
  }
}

struct Harness {
  model: Arc<MockModel>,
  frame_store: Arc<MockFrameStore>,
  alert_store: Arc<MockAlertStore>,
  pipeline: Pipeline,
}

fn harness(
  sampler: MockSampler,
  model: MockModel,
  frame_store: MockFrameStore,
  alert_store: MockAlertStore,
  config: PipelineConfig,
) -> Harness {
  let model = Arc::new(model);
  let frame_store = Arc::new(frame_store);
  let alert_store = Arc::new(alert_store);
  let pipeline = Pipeline::new(
    Arc::new(sampler),
    model.clone(),
    frame_store.clone(),
    alert_store.clone(),
  )
  .with_config(config);
  Harness {
    model,
    frame_store,
    alert_store,
    pipeline,
  }
}

fn sampler(frames: usize) -> MockSampler {
  MockSampler { frames, fail: false }
}

#[tokio::test]
async fn only_even_positions_reach_the_model() {
  let h = harness(
    sampler(3),
    MockModel::new(Behavior::Detect(1)),
    MockFrameStore::default(),
    MockAlertStore::default(),
    PipelineConfig::default(),
  );

  let created = h.pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 2);
  assert_eq!(h.model.seen(), vec![0, 2]);
}

#[tokio::test]
async fn failing_frame_does_not_stop_its_batch() {
  let h = harness(
    sampler(10),
    MockModel::new(Behavior::Detect(1)).on(4, Behavior::Fail),
    MockFrameStore::default(),
    MockAlertStore::default(),
    PipelineConfig::default(),
  );

  let created = h.pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 4);
  assert_eq!(h.model.seen(), vec![0, 2, 4, 6, 8]);
  assert_eq!(h.alert_store.alerts.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn frames_without_detections_are_not_stored() {
  let h = harness(
    sampler(6),
    MockModel::new(Behavior::Detect(0)).on(2, Behavior::Detect(3)),
    MockFrameStore::default(),
    MockAlertStore::default(),
    PipelineConfig::default(),
  );

  let created = h.pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 3);

  let names = h.frame_store.names.lock().unwrap().clone();
  assert_eq!(names.len(), 1);
  assert!(names[0].starts_with("frame-"));
  assert!(names[0].ends_with("-2.png"));

  let alerts = h.alert_store.alerts.lock().unwrap().clone();
  assert!(alerts.iter().all(|a| a.frame_url == format!("/frames/{}", names[0])));
  assert!(alerts.iter().all(|a| a.kind == "person"));
  assert_eq!(alerts[0].message, "Detected a person with 90.0% confidence");
}

#[tokio::test]
async fn at_most_one_batch_is_in_flight() {
  let h = harness(
    sampler(30),
    MockModel::new(Behavior::Sleep(Duration::from_millis(20), 0)),
    MockFrameStore::default(),
    MockAlertStore::default(),
    PipelineConfig::default(),
  );

  let created = h.pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 0);
  assert_eq!(h.model.seen().len(), 15);
  assert_eq!(h.model.max_in_flight.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn smaller_batch_size_limits_concurrency() {
  let config = PipelineConfig {
    batch_size: 2,
    ..PipelineConfig::default()
  };
  let h = harness(
    sampler(10),
    MockModel::new(Behavior::Sleep(Duration::from_millis(10), 1)),
    MockFrameStore::default(),
    MockAlertStore::default(),
    config,
  );

  let created = h.pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 5);
  assert_eq!(h.model.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sampling_failure_is_returned() {
  let h = harness(
    MockSampler { frames: 3, fail: true },
    MockModel::new(Behavior::Detect(1)),
    MockFrameStore::default(),
    MockAlertStore::default(),
    PipelineConfig::default(),
  );

  let result = h.pipeline.process(b"not a video".to_vec()).await;
  assert!(matches!(
    result,
    Err(PipelineError::SampleError(InputError::MediaLoadError(_)))
  ));
  assert!(h.model.seen().is_empty());
}

#[tokio::test]
async fn zero_interval_is_rejected() {
  let config = PipelineConfig {
    interval_ms: 0,
    ..PipelineConfig::default()
  };
  let h = harness(
    sampler(3),
    MockModel::new(Behavior::Detect(1)),
    MockFrameStore::default(),
    MockAlertStore::default(),
    config,
  );

  let result = h.pipeline.process(b"video".to_vec()).await;
  assert!(matches!(
    result,
    Err(PipelineError::SampleError(InputError::InvalidInterval))
  ));
}

#[tokio::test]
async fn frame_store_failure_skips_alerts() {
  let h = harness(
    sampler(3),
    MockModel::new(Behavior::Detect(2)),
    MockFrameStore {
      fail: true,
      ..MockFrameStore::default()
    },
    MockAlertStore::default(),
    PipelineConfig::default(),
  );

  let created = h.pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 0);
  assert_eq!(h.frame_store.names.lock().unwrap().len(), 2);
  assert!(h.alert_store.alerts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn alert_failure_stops_the_rest_of_the_frame() {
  let h = harness(
    sampler(1),
    MockModel::new(Behavior::Detect(3)),
    MockFrameStore::default(),
    MockAlertStore {
      capacity: Some(1),
      ..MockAlertStore::default()
    },
    PipelineConfig::default(),
  );

  let created = h.pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 1);
}

#[tokio::test]
async fn slow_frame_is_skipped_after_timeout() {
  let config = PipelineConfig {
    frame_timeout: Some(Duration::from_secs(2)),
    ..PipelineConfig::default()
  };
  let h = harness(
    sampler(3),
    MockModel::new(Behavior::Detect(1)).on(2, Behavior::Sleep(Duration::from_secs(60), 1)),
    MockFrameStore::default(),
    MockAlertStore::default(),
    config,
  );

  let created = h.pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 1);
  let names = h.frame_store.names.lock().unwrap().clone();
  assert_eq!(names.len(), 1);
  assert!(names[0].ends_with("-0.png"));
}

#[tokio::test]
async fn process_file_uses_the_same_pipeline() {
  let h = harness(
    sampler(5),
    MockModel::new(Behavior::Detect(1)),
    MockFrameStore::default(),
    MockAlertStore::default(),
    PipelineConfig::default(),
  );

  let created = h.pipeline.process_file("/data/clip.mp4").await.unwrap();
  assert_eq!(created, 3);
  assert_eq!(h.model.seen(), vec![0, 2, 4]);
}

#[tokio::test]
async fn every_alert_points_at_its_own_frame() {
  // 各帧推理耗时不同，保存顺序与批内顺序交错
  let model = MockModel::new(Behavior::Detect(2))
    .on(0, Behavior::Sleep(Duration::from_millis(40), 2))
    .on(2, Behavior::Sleep(Duration::from_millis(10), 2))
    .on(4, Behavior::Sleep(Duration::from_millis(30), 2))
    .on(6, Behavior::Sleep(Duration::from_millis(0), 2))
    .on(8, Behavior::Sleep(Duration::from_millis(20), 2));
  let h = harness(
    sampler(10),
    model,
    MockFrameStore::default(),
    MockAlertStore::default(),
    PipelineConfig::default(),
  );

  let created = h.pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 10);

  let stored = h.frame_store.stored.lock().unwrap().clone();
  assert_eq!(stored.len(), 5);
  let alerts = h.alert_store.alerts.lock().unwrap().clone();
  for alert in &alerts {
    let red = stored[&alert.frame_url];
    assert!(
      alert.frame_url.ends_with(&format!("-{}.png", red)),
      "{} holds pixels of frame {}",
      alert.frame_url,
      red
    );
  }
  let mut reds: Vec<u8> = stored.values().copied().collect();
  reds.sort();
  assert_eq!(reds, vec![0, 2, 4, 6, 8]);
}

#[tokio::test]
async fn odd_sample_points_are_never_decoded() {
  let sampler = Arc::new(SkippingSampler {
    frames: 7,
    decoded: AtomicUsize::new(0),
  });
  let model = Arc::new(MockModel::new(Behavior::Detect(1)));
  let pipeline = Pipeline::new(
    sampler.clone(),
    model.clone(),
    Arc::new(MockFrameStore::default()),
    Arc::new(MockAlertStore::default()),
  );

  let created = pipeline.process(b"video".to_vec()).await.unwrap();
  assert_eq!(created, 4);
  assert_eq!(sampler.decoded.load(Ordering::SeqCst), 4);
  assert_eq!(model.seen(), vec![0, 2, 4, 6]);
}
