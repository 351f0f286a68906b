// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod export;
pub mod predict;
pub mod prompt;
mod protocol;
pub mod ultralytics;

pub use self::export::{Device, ExportFormat, ExportOptionError, ExportOptions};
pub use self::predict::{PredictOptions, PredictorKind};
pub use self::prompt::{PromptError, VisualPrompts};
pub use self::ultralytics::{UltralyticsBackend, UltralyticsBackendBuilder, UltralyticsModel};

/// 默认的 YoloE 分割模型权重，由推理库负责查找或下载
pub const DEFAULT_MODEL: &str = "yoloe-11m-seg.pt";

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("无法启动推理进程: {0}")]
  SpawnError(std::io::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("协议错误: {0}")]
  ProtocolError(#[from] serde_json::Error),
  #[error("推理进程已退出")]
  BridgeClosed,
  #[error("推理库错误: {0}")]
  LibraryError(String),
  #[error("文件不存在: {0}")]
  NotFound(String),
  #[error("类别数量与嵌入数量不一致: 类别 {names}, 嵌入 {embeddings}")]
  ClassCountMismatch { names: usize, embeddings: usize },
  #[error("嵌入维度不一致: 期望 {expected}, 实际 {actual}")]
  EmbeddingDimMismatch { expected: usize, actual: usize },
  #[error("模型当前没有任何类别")]
  EmptyClasses,
}

/// 模型后端，负责按标识加载模型
pub trait Backend {
  type Model: Model;

  /// 标识可以是本地路径，也可以是推理库能解析的预训练模型名
  fn load(&self, model: &str) -> Result<Self::Model, ModelError>;
}

/// 已加载的模型句柄
///
/// 句柄持有当前激活的类别集合，`set_classes` 之后的预测与导出都使用新的类别。
/// 句柄被释放时，其占用的资源一并释放。
pub trait Model {
  fn classes(&self) -> &[String];
  fn text_embeddings(&mut self, names: &[String]) -> Result<TextEmbeddings, ModelError>;
  fn set_classes(&mut self, names: &[String], embeddings: TextEmbeddings)
  -> Result<(), ModelError>;
  fn predict(&mut self, options: &PredictOptions) -> Result<Vec<Prediction>, ModelError>;

  /// 返回推理库写出的模型文件路径
  fn export(&mut self, options: &ExportOptions) -> Result<PathBuf, ModelError>;
}

/// 文本嵌入集合，每个类别名对应一个向量，所有向量维度相同
#[derive(Debug, Clone, PartialEq)]
pub struct TextEmbeddings {
  dim: usize,
  vectors: Box<[Box<[f32]>]>,
}

impl TextEmbeddings {
  pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Result<Self, ModelError> {
    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
      return Err(ModelError::EmbeddingDimMismatch {
        expected: dim,
        actual: bad.len(),
      });
    }

    Ok(Self {
      dim,
      vectors: vectors.into_iter().map(Vec::into_boxed_slice).collect(),
    })
  }

  pub fn len(&self) -> usize {
    self.vectors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vectors.is_empty()
  }

  pub fn dim(&self) -> usize {
    self.dim
  }

  pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
    self.vectors.iter().map(|v| &v[..])
  }

  /// 嵌入数量必须与类别数量一致
  pub fn check_count(&self, names: usize) -> Result<(), ModelError> {
    if self.len() != names {
      return Err(ModelError::ClassCountMismatch {
        names,
        embeddings: self.len(),
      });
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectItem {
  pub class_id: u32,
  pub name: String,
  pub score: f32,
  pub bbox: [f32; 4], // 像素坐标 [x_min, y_min, x_max, y_max]
  /// 分割轮廓，像素坐标的多边形顶点；检测模型没有
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mask: Option<Vec<[f32; 2]>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// 单张图像的预测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
  pub source: String,
  pub width: u32,
  pub height: u32,
  #[serde(flatten)]
  pub result: DetectResult,
}
