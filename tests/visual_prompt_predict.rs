// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// tests/visual_prompt_predict.rs - 视觉提示推理任务测试
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

mod common;

use std::path::{Path, PathBuf};

use common::{FakeBackend, RecordingOutput};
use yoloe_prompt::model::{ExportOptions, PromptError, VisualPrompts};
use yoloe_prompt::output::LogOutput;
use yoloe_prompt::task::{PipelineError, Task, VisualPromptPredictTask};

const MODEL: &str = "yoloe-11m-seg.pt";

struct Images {
  target: PathBuf,
  refer: PathBuf,
}

fn images(dir: &Path) -> Images {
  let target = dir.join("target_image.jpg");
  let refer = dir.join("visual_prompt.jpg");
  std::fs::write(&target, b"target").unwrap();
  std::fs::write(&refer, b"refer").unwrap();
  Images { target, refer }
}

fn path_str(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

#[test]
fn test_predict_display_and_export() {
  let dir = tempfile::tempdir().unwrap();
  let images = images(dir.path());
  let backend = FakeBackend::new(&dir.path().join("export"));
  let output = RecordingOutput::default();

  let result = VisualPromptPredictTask::new(
    MODEL,
    path_str(&images.target),
    path_str(&images.refer),
    VisualPrompts::default(),
    &output,
  )
  .conf(0.1)
  .run_task(&backend)
  .unwrap();

  assert_eq!(result.predictions.len(), 1);
  assert_eq!(result.predictions[0].result.len(), 1);
  assert!(result.displayed);
  assert_eq!(*output.shown.borrow(), vec![path_str(&images.target)]);
  assert!(result.artifact.is_file());
  assert_eq!(backend.exported_files().len(), 1);
  assert_eq!(result.classes, vec!["object0".to_string()]);

  let calls = backend.calls();
  assert_eq!(calls.predicts, 1);
  assert_eq!(calls.exports, 1);
  assert_eq!(calls.set_classes, 0);
}

#[test]
fn test_visual_prompts_replace_loaded_classes() {
  let dir = tempfile::tempdir().unwrap();
  let images = images(dir.path());
  let mut backend = FakeBackend::new(&dir.path().join("export"));
  backend.default_classes = common::text_prompts();
  let prompts = VisualPrompts::new(
    vec![[352.0, 185.0, 375.0, 207.0], [10.0, 10.0, 40.0, 40.0]],
    vec![0, 1],
  );

  let result = VisualPromptPredictTask::new(
    MODEL,
    path_str(&images.target),
    path_str(&images.refer),
    prompts,
    &RecordingOutput::default(),
  )
  .run_task(&backend)
  .unwrap();

  assert_eq!(
    result.classes,
    vec!["object0".to_string(), "object1".to_string()]
  );
  let content = std::fs::read_to_string(&result.artifact).unwrap();
  assert!(content.ends_with("classes=object0|object1"));
}

#[test]
fn test_length_mismatch_is_rejected_before_inference() {
  let dir = tempfile::tempdir().unwrap();
  let images = images(dir.path());
  let backend = FakeBackend::new(&dir.path().join("export"));
  let prompts = VisualPrompts::new(vec![[352.0, 185.0, 375.0, 207.0]], vec![0, 0]);

  let result = VisualPromptPredictTask::new(
    MODEL,
    path_str(&images.target),
    path_str(&images.refer),
    prompts,
    &RecordingOutput::default(),
  )
  .run_task(&backend);

  assert!(matches!(
    result,
    Err(PipelineError::InvalidPromptError(
      PromptError::LengthMismatch { bboxes: 1, cls: 2 }
    ))
  ));
  assert_eq!(backend.calls().predicts, 0);
  assert_eq!(backend.calls().loads, 0);
}

#[test]
fn test_malformed_box_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let images = images(dir.path());
  let backend = FakeBackend::new(&dir.path().join("export"));

  for bbox in [[375.0, 185.0, 352.0, 207.0], [352.0, 207.0, 375.0, 207.0]] {
    let result = VisualPromptPredictTask::new(
      MODEL,
      path_str(&images.target),
      path_str(&images.refer),
      VisualPrompts::new(vec![bbox], vec![0]),
      &RecordingOutput::default(),
    )
    .run_task(&backend);

    assert!(matches!(
      result,
      Err(PipelineError::InvalidPromptError(
        PromptError::MalformedBox { index: 0, .. }
      ))
    ));
  }
  assert_eq!(backend.calls().predicts, 0);
}

#[test]
fn test_confidence_out_of_range() {
  let dir = tempfile::tempdir().unwrap();
  let images = images(dir.path());
  let backend = FakeBackend::new(&dir.path().join("export"));

  let result = VisualPromptPredictTask::new(
    MODEL,
    path_str(&images.target),
    path_str(&images.refer),
    VisualPrompts::default(),
    &RecordingOutput::default(),
  )
  .conf(-0.5)
  .run_task(&backend);

  assert!(matches!(result, Err(PipelineError::InvalidPromptError(_))));
}

#[test]
fn test_missing_reference_image() {
  let dir = tempfile::tempdir().unwrap();
  let images = images(dir.path());
  let backend = FakeBackend::new(&dir.path().join("export"));
  let output = RecordingOutput::default();

  let result = VisualPromptPredictTask::new(
    MODEL,
    path_str(&images.target),
    path_str(&dir.path().join("missing.jpg")),
    VisualPrompts::default(),
    &output,
  )
  .run_task(&backend);

  assert!(matches!(result, Err(PipelineError::InferenceError(_))));
  assert!(output.shown.borrow().is_empty());
  assert!(backend.exported_files().is_empty());
}

#[test]
fn test_empty_results_skip_display_but_export() {
  let dir = tempfile::tempdir().unwrap();
  let images = images(dir.path());
  let mut backend = FakeBackend::new(&dir.path().join("export"));
  backend.detections = None;
  let output = RecordingOutput::default();

  let result = VisualPromptPredictTask::new(
    MODEL,
    path_str(&images.target),
    path_str(&images.refer),
    VisualPrompts::default(),
    &output,
  )
  .run_task(&backend)
  .unwrap();

  assert!(result.predictions.is_empty());
  assert!(!result.displayed);
  assert!(output.shown.borrow().is_empty());
  assert!(result.artifact.is_file());
}

#[test]
fn test_display_failure_stops_before_export() {
  let dir = tempfile::tempdir().unwrap();
  let images = images(dir.path());
  let backend = FakeBackend::new(&dir.path().join("export"));
  let output = RecordingOutput {
    fail: true,
    ..Default::default()
  };

  let result = VisualPromptPredictTask::new(
    MODEL,
    path_str(&images.target),
    path_str(&images.refer),
    VisualPrompts::default(),
    &output,
  )
  .run_task(&backend);

  assert!(matches!(result, Err(PipelineError::DisplayError(_))));
  assert_eq!(backend.calls().exports, 0);
  assert!(backend.exported_files().is_empty());
}

#[test]
fn test_headless_log_output() {
  let dir = tempfile::tempdir().unwrap();
  let images = images(dir.path());
  let backend = FakeBackend::new(&dir.path().join("export"));
  let destination = dir.path().join("onnx").join("yoloe-vp.onnx");

  let result = VisualPromptPredictTask::new(
    MODEL,
    path_str(&images.target),
    path_str(&images.refer),
    VisualPrompts::default(),
    LogOutput,
  )
  .export(ExportOptions::default().output(Some(destination.clone())))
  .run_task(&backend)
  .unwrap();

  assert!(result.displayed);
  assert_eq!(result.artifact, destination);
  assert!(destination.is_file());
}
