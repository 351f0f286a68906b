// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// tests/common/mod.rs - 测试用的内存后端
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

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use yoloe_prompt::model::{
  Backend, DetectItem, DetectResult, ExportOptions, Model, ModelError, PredictOptions, Prediction,
  TextEmbeddings,
};
use yoloe_prompt::output::Render;

pub const TEXT_PROMPTS: [&str; 4] = [
  "traffic light",
  "red sports car",
  "flying bird",
  "yellow construction helmet",
];

pub fn text_prompts() -> Vec<String> {
  TEXT_PROMPTS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Calls {
  pub loads: usize,
  pub text_embeddings: usize,
  pub set_classes: usize,
  pub predicts: usize,
  pub exports: usize,
}

/// 在内存中模拟推理库，导出时写出一个小文件
pub struct FakeBackend {
  pub export_dir: PathBuf,
  pub default_classes: Vec<String>,
  pub fail_load: bool,
  pub embedding_dim: usize,
  pub drop_one_embedding: bool,
  pub detections: Option<Vec<DetectItem>>,
  pub calls: Rc<RefCell<Calls>>,
}

impl FakeBackend {
  pub fn new(export_dir: &Path) -> Self {
    Self {
      export_dir: export_dir.to_path_buf(),
      default_classes: vec!["object0".to_string()],
      fail_load: false,
      embedding_dim: 8,
      drop_one_embedding: false,
      detections: Some(vec![DetectItem {
        class_id: 0,
        name: "object0".to_string(),
        score: 0.42,
        bbox: [350.0, 183.0, 377.0, 209.0],
        mask: None,
      }]),
      calls: Rc::new(RefCell::new(Calls::default())),
    }
  }

  pub fn calls(&self) -> Calls {
    self.calls.borrow().clone()
  }

  pub fn exported_files(&self) -> Vec<PathBuf> {
    match std::fs::read_dir(&self.export_dir) {
      Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
      Err(_) => Vec::new(),
    }
  }
}

pub struct FakeModel {
  name: String,
  classes: Vec<String>,
  export_dir: PathBuf,
  embedding_dim: usize,
  drop_one_embedding: bool,
  detections: Option<Vec<DetectItem>>,
  calls: Rc<RefCell<Calls>>,
}

impl Backend for FakeBackend {
  type Model = FakeModel;

  fn load(&self, model: &str) -> Result<Self::Model, ModelError> {
    self.calls.borrow_mut().loads += 1;
    if self.fail_load {
      return Err(ModelError::NotFound(model.to_string()));
    }
    Ok(FakeModel {
      name: model.to_string(),
      classes: self.default_classes.clone(),
      export_dir: self.export_dir.clone(),
      embedding_dim: self.embedding_dim,
      drop_one_embedding: self.drop_one_embedding,
      detections: self.detections.clone(),
      calls: self.calls.clone(),
    })
  }
}

impl Model for FakeModel {
  fn classes(&self) -> &[String] {
    &self.classes
  }

  fn text_embeddings(&mut self, names: &[String]) -> Result<TextEmbeddings, ModelError> {
    self.calls.borrow_mut().text_embeddings += 1;
    let count = if self.drop_one_embedding {
      names.len().saturating_sub(1)
    } else {
      names.len()
    };
    let vectors = (0..count)
      .map(|i| vec![i as f32; self.embedding_dim])
      .collect();
    TextEmbeddings::from_vectors(vectors)
  }

  fn set_classes(
    &mut self,
    names: &[String],
    embeddings: TextEmbeddings,
  ) -> Result<(), ModelError> {
    self.calls.borrow_mut().set_classes += 1;
    embeddings.check_count(names.len())?;
    self.classes = names.to_vec();
    Ok(())
  }

  fn predict(&mut self, options: &PredictOptions) -> Result<Vec<Prediction>, ModelError> {
    self.calls.borrow_mut().predicts += 1;
    for source in std::iter::once(&options.source).chain(options.refer_image.as_ref()) {
      if !Path::new(source).exists() {
        return Err(ModelError::NotFound(source.clone()));
      }
    }
    // 与推理库一致，视觉提示把类别替换为 object0..objectN
    if let Some(prompts) = &options.visual_prompts
      && let Some(max) = prompts.cls.iter().max()
    {
      self.classes = (0..=*max).map(|i| format!("object{}", i)).collect();
    }

    Ok(
      self
        .detections
        .iter()
        .map(|items| Prediction {
          source: options.source.clone(),
          width: 640,
          height: 480,
          result: DetectResult {
            items: items.clone().into_boxed_slice(),
          },
        })
        .collect(),
    )
  }

  fn export(&mut self, options: &ExportOptions) -> Result<PathBuf, ModelError> {
    self.calls.borrow_mut().exports += 1;
    if self.classes.is_empty() {
      return Err(ModelError::EmptyClasses);
    }
    std::fs::create_dir_all(&self.export_dir)?;
    let stem = Path::new(&self.name)
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "model".to_string());
    let path = self
      .export_dir
      .join(format!("{}.{}", stem, options.format.extension()));
    std::fs::write(
      &path,
      format!("opset={} classes={}", options.opset, self.classes.join("|")),
    )?;
    Ok(path)
  }
}

#[derive(Debug, thiserror::Error)]
#[error("no display backend available")]
pub struct NoDisplay;

/// 记录被显示的结果
#[derive(Default)]
pub struct RecordingOutput {
  pub shown: RefCell<Vec<String>>,
  pub fail: bool,
}

impl Render<Prediction> for RecordingOutput {
  type Error = NoDisplay;

  fn render_result(&self, result: &Prediction) -> Result<(), Self::Error> {
    if self.fail {
      return Err(NoDisplay);
    }
    self.shown.borrow_mut().push(result.source.clone());
    Ok(())
  }
}

impl Render<Prediction> for &RecordingOutput {
  type Error = NoDisplay;

  fn render_result(&self, result: &Prediction) -> Result<(), Self::Error> {
    <RecordingOutput as Render<Prediction>>::render_result(*self, result)
  }
}
