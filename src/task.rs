// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/task.rs - 文本提示导出与视觉提示推理任务
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::model::export::persist_artifact;
use crate::model::prompt::validate_class_names;
use crate::model::{
  Backend, ExportOptionError, ExportOptions, Model, ModelError, PredictOptions, Prediction,
  PredictorKind, PromptError, TextEmbeddings, VisualPrompts,
};
use crate::output::Render;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum ExportFailure {
  #[error(transparent)]
  Options(#[from] ExportOptionError),
  #[error(transparent)]
  Model(#[from] ModelError),
}

/// 任务失败的原因，任何一步失败都会立即终止任务
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("提示无效: {0}")]
  InvalidPromptError(#[from] PromptError),
  #[error("模型加载失败: {0}")]
  ModelLoadError(#[source] ModelError),
  #[error("文本嵌入计算失败: {0}")]
  EmbeddingComputeError(#[source] ModelError),
  #[error("设置类别失败: {0}")]
  SetClassesError(#[source] ModelError),
  #[error("推理失败: {0}")]
  InferenceError(#[source] ModelError),
  #[error("结果显示失败: {0}")]
  DisplayError(#[source] BoxError),
  #[error("模型导出失败: {0}")]
  ExportError(#[source] ExportFailure),
}

impl PipelineError {
  fn export(err: impl Into<ExportFailure>) -> Self {
    PipelineError::ExportError(err.into())
  }
}

pub fn load_model<B: Backend>(backend: &B, model: &str) -> Result<B::Model, PipelineError> {
  backend.load(model).map_err(PipelineError::ModelLoadError)
}

pub fn compute_text_embeddings<M: Model>(
  model: &mut M,
  names: &[String],
) -> Result<TextEmbeddings, PipelineError> {
  let embeddings = model
    .text_embeddings(names)
    .map_err(PipelineError::EmbeddingComputeError)?;
  if let Err(e) = embeddings.check_count(names.len()) {
    error!(
      "文本嵌入数量 {} 与类别数量 {} 不一致",
      embeddings.len(),
      names.len()
    );
    return Err(PipelineError::EmbeddingComputeError(e));
  }
  Ok(embeddings)
}

pub fn bind_classes<M: Model>(
  model: &mut M,
  names: &[String],
  embeddings: TextEmbeddings,
) -> Result<(), PipelineError> {
  model
    .set_classes(names, embeddings)
    .map_err(PipelineError::SetClassesError)
}

pub fn run_prediction<M: Model>(
  model: &mut M,
  options: &PredictOptions,
) -> Result<Vec<Prediction>, PipelineError> {
  model.predict(options).map_err(PipelineError::InferenceError)
}

/// 显示第一张图像的结果，没有结果时返回 `false`
pub fn display_first<O>(output: &O, predictions: &[Prediction]) -> Result<bool, PipelineError>
where
  O: Render<Prediction>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  let Some(first) = predictions.first() else {
    warn!("没有预测结果，跳过显示");
    return Ok(false);
  };
  output
    .render_result(first)
    .map_err(|e| PipelineError::DisplayError(Box::new(e)))?;
  Ok(true)
}

/// 导出模型，设置了 `output` 时把文件放到指定位置
pub fn export_model<M: Model>(
  model: &mut M,
  options: &ExportOptions,
) -> Result<PathBuf, PipelineError> {
  options.validate().map_err(PipelineError::export)?;
  if model.classes().is_empty() {
    error!("模型没有任何类别，拒绝导出");
    return Err(PipelineError::export(ModelError::EmptyClasses));
  }

  info!(
    "导出模型: format={}, device={}, opset={}",
    options.format, options.device, options.opset
  );
  let artifact = model.export(options).map_err(PipelineError::export)?;

  match &options.output {
    Some(destination) => {
      let placed = persist_artifact(&artifact, destination).map_err(PipelineError::export)?;
      warn!(
        "模型文件已复制: {} -> {}",
        artifact.display(),
        placed.display()
      );
      Ok(placed)
    }
    None => Ok(artifact),
  }
}

pub trait Task<B: Backend>: Sized {
  type Output;
  fn run_task(self, backend: &B) -> Result<Self::Output, PipelineError>;
}

/// 用文本提示设置类别并导出模型
pub struct TextPromptExportTask {
  model: String,
  names: Vec<String>,
  export: ExportOptions,
}

#[derive(Debug, Clone)]
pub struct TextPromptExportOutput {
  pub classes: Vec<String>,
  pub embedding_count: usize,
  pub embedding_dim: usize,
  pub artifact: PathBuf,
}

impl TextPromptExportTask {
  pub fn new(model: impl Into<String>, names: Vec<String>) -> Self {
    Self {
      model: model.into(),
      names,
      export: ExportOptions::default(),
    }
  }

  pub fn export(mut self, export: ExportOptions) -> Self {
    self.export = export;
    self
  }
}

impl<B: Backend> Task<B> for TextPromptExportTask {
  type Output = TextPromptExportOutput;

  fn run_task(self, backend: &B) -> Result<Self::Output, PipelineError> {
    info!("开始文本提示导出任务...");
    validate_class_names(&self.names)?;
    self.export.validate().map_err(PipelineError::export)?;

    let mut model = load_model(backend, &self.model)?;

    let now = std::time::Instant::now();
    let embeddings = compute_text_embeddings(&mut model, &self.names)?;
    let (embedding_count, embedding_dim) = (embeddings.len(), embeddings.dim());
    info!(
      "文本嵌入计算完成: {} 个, 维度 {}, 耗时: {:.2?}",
      embedding_count,
      embedding_dim,
      now.elapsed()
    );

    bind_classes(&mut model, &self.names, embeddings)?;
    info!("已设置类别: {:?}", model.classes());

    let artifact = export_model(&mut model, &self.export)?;
    info!("导出完成: {}", artifact.display());

    Ok(TextPromptExportOutput {
      classes: model.classes().to_vec(),
      embedding_count,
      embedding_dim,
      artifact,
    })
  }
}

/// 用参考图像上的视觉提示引导目标图像的推理，显示结果后导出模型
///
/// 导出的模型只包含基础配置，不包含本次使用的视觉提示。
pub struct VisualPromptPredictTask<O> {
  model: String,
  predict: PredictOptions,
  export: ExportOptions,
  output: O,
}

#[derive(Debug, Clone)]
pub struct VisualPromptPredictOutput {
  pub predictions: Vec<Prediction>,
  /// 推理后模型的类别
  pub classes: Vec<String>,
  pub displayed: bool,
  pub artifact: PathBuf,
}

impl<O> VisualPromptPredictTask<O> {
  pub fn new(
    model: impl Into<String>,
    source: impl Into<String>,
    refer_image: impl Into<String>,
    prompts: VisualPrompts,
    output: O,
  ) -> Self {
    Self {
      model: model.into(),
      predict: PredictOptions::new(source).with_visual_prompts(refer_image, prompts),
      export: ExportOptions::default(),
      output,
    }
  }

  pub fn predictor(mut self, predictor: PredictorKind) -> Self {
    self.predict = self.predict.predictor(predictor);
    self
  }

  pub fn conf(mut self, conf: f32) -> Self {
    self.predict = self.predict.conf(conf);
    self
  }

  pub fn iou(mut self, iou: f32) -> Self {
    self.predict = self.predict.iou(iou);
    self
  }

  pub fn export(mut self, export: ExportOptions) -> Self {
    self.export = export;
    self
  }
}

impl<B, O> Task<B> for VisualPromptPredictTask<O>
where
  B: Backend,
  O: Render<Prediction>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = VisualPromptPredictOutput;

  fn run_task(self, backend: &B) -> Result<Self::Output, PipelineError> {
    info!("开始视觉提示推理任务...");
    self.predict.validate()?;
    self.export.validate().map_err(PipelineError::export)?;

    let mut model = load_model(backend, &self.model)?;

    info!(
      "目标图像: {}, 参考图像: {}",
      self.predict.source,
      self.predict.refer_image.as_deref().unwrap_or("-")
    );
    let now = std::time::Instant::now();
    let predictions = run_prediction(&mut model, &self.predict)?;
    info!(
      "推理完成，{} 张图像，耗时: {:.2?}",
      predictions.len(),
      now.elapsed()
    );
    info!("当前类别: {:?}", model.classes());

    let displayed = display_first(&self.output, &predictions)?;

    let artifact = export_model(&mut model, &self.export)?;
    info!("导出完成: {}", artifact.display());

    Ok(VisualPromptPredictOutput {
      predictions,
      classes: model.classes().to_vec(),
      displayed,
      artifact,
    })
  }
}
