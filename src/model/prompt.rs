// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/model/prompt.rs - 文本提示与视觉提示
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

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum PromptError {
  #[error("类别列表为空")]
  NoClasses,
  #[error("第 {0} 个类别名为空")]
  BlankClass(usize),
  #[error("类别名重复: {0}")]
  DuplicateClass(String),
  #[error("视觉提示为空")]
  NoBoxes,
  #[error("边界框数量 {bboxes} 与类别编号数量 {cls} 不一致")]
  LengthMismatch { bboxes: usize, cls: usize },
  #[error("第 {index} 个边界框无效: {bbox:?}")]
  MalformedBox { index: usize, bbox: [f32; 4] },
  #[error("{name} 超出范围 [0, 1]: {value}")]
  OutOfRange { name: &'static str, value: f32 },
  #[error("无法解析边界框 '{0}'，格式应为 left,top,right,bottom")]
  BadBoxSyntax(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("视觉提示文件格式错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 未指定文本提示时使用的类别
pub const DEFAULT_TEXT_PROMPTS: [&str; 4] = [
  "traffic light",
  "red sports car",
  "flying bird",
  "yellow construction helmet",
];

pub fn default_text_prompts() -> Vec<String> {
  DEFAULT_TEXT_PROMPTS.iter().map(|s| s.to_string()).collect()
}

/// 校验文本提示：非空、无空白名、无重复
pub fn validate_class_names(names: &[String]) -> Result<(), PromptError> {
  if names.is_empty() {
    return Err(PromptError::NoClasses);
  }

  let mut seen = HashSet::with_capacity(names.len());
  for (index, name) in names.iter().enumerate() {
    let trimmed = name.trim();
    if trimmed.is_empty() {
      return Err(PromptError::BlankClass(index));
    }
    if !seen.insert(trimmed) {
      return Err(PromptError::DuplicateClass(name.clone()));
    }
  }
  Ok(())
}

/// 视觉提示：参考图像上的示例边界框及其类别编号
///
/// `bboxes` 与 `cls` 一一对应，边界框为参考图像的像素坐标 `[left, top, right, bottom]`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualPrompts {
  pub bboxes: Vec<[f32; 4]>,
  pub cls: Vec<u32>,
}

impl Default for VisualPrompts {
  fn default() -> Self {
    Self {
      bboxes: vec![[352.0, 185.0, 375.0, 207.0]],
      cls: vec![0],
    }
  }
}

impl VisualPrompts {
  pub fn new(bboxes: Vec<[f32; 4]>, cls: Vec<u32>) -> Self {
    Self { bboxes, cls }
  }

  /// 从 JSON 文件读取，格式为 `{"bboxes": [[l, t, r, b]], "cls": [0]}`
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PromptError> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
  }

  pub fn len(&self) -> usize {
    self.bboxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bboxes.is_empty()
  }

  pub fn validate(&self) -> Result<(), PromptError> {
    if self.bboxes.len() != self.cls.len() {
      error!(
        "边界框数量 {} 与类别编号数量 {} 不一致",
        self.bboxes.len(),
        self.cls.len()
      );
      return Err(PromptError::LengthMismatch {
        bboxes: self.bboxes.len(),
        cls: self.cls.len(),
      });
    }

    if self.bboxes.is_empty() {
      return Err(PromptError::NoBoxes);
    }

    for (index, bbox) in self.bboxes.iter().enumerate() {
      let [left, top, right, bottom] = *bbox;
      let finite = bbox.iter().all(|v| v.is_finite());
      if !finite || left >= right || top >= bottom {
        return Err(PromptError::MalformedBox { index, bbox: *bbox });
      }
    }
    Ok(())
  }
}

/// 解析命令行中的 `left,top,right,bottom`
pub fn parse_bbox(s: &str) -> Result<[f32; 4], PromptError> {
  let values = s
    .split(',')
    .map(|v| v.trim().parse::<f32>())
    .collect::<Result<Vec<_>, _>>()
    .map_err(|_| PromptError::BadBoxSyntax(s.to_string()))?;

  <[f32; 4]>::try_from(values).map_err(|_| PromptError::BadBoxSyntax(s.to_string()))
}

/// 阈值必须在 [0, 1] 之内
pub fn check_unit_range(name: &'static str, value: f32) -> Result<(), PromptError> {
  if !(0.0..=1.0).contains(&value) {
    return Err(PromptError::OutOfRange { name, value });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_default_visual_prompt_is_valid() {
    let prompts = VisualPrompts::default();
    assert_eq!(prompts.bboxes, vec![[352.0, 185.0, 375.0, 207.0]]);
    assert_eq!(prompts.cls, vec![0]);
    assert!(prompts.validate().is_ok());
  }

  #[test]
  fn test_length_mismatch() {
    let prompts = VisualPrompts::new(vec![[0.0, 0.0, 10.0, 10.0]], vec![0, 1]);
    assert!(matches!(
      prompts.validate(),
      Err(PromptError::LengthMismatch { bboxes: 1, cls: 2 })
    ));
  }

  #[test]
  fn test_degenerate_boxes() {
    let flat_x = VisualPrompts::new(vec![[10.0, 0.0, 10.0, 5.0]], vec![0]);
    assert!(matches!(
      flat_x.validate(),
      Err(PromptError::MalformedBox { index: 0, .. })
    ));

    let flipped_y = VisualPrompts::new(
      vec![[0.0, 0.0, 5.0, 5.0], [0.0, 9.0, 5.0, 3.0]],
      vec![0, 0],
    );
    assert!(matches!(
      flipped_y.validate(),
      Err(PromptError::MalformedBox { index: 1, .. })
    ));

    let nan = VisualPrompts::new(vec![[f32::NAN, 0.0, 5.0, 5.0]], vec![0]);
    assert!(nan.validate().is_err());
  }

  #[test]
  fn test_empty_prompts() {
    let prompts = VisualPrompts::new(vec![], vec![]);
    assert!(matches!(prompts.validate(), Err(PromptError::NoBoxes)));
  }

  #[test]
  fn test_prompts_from_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prompts.json");
    std::fs::write(&path, r#"{"bboxes": [[1, 2, 30, 40], [5, 5, 9, 9]], "cls": [0, 1]}"#).unwrap();

    let prompts = VisualPrompts::from_json_file(&path).unwrap();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts.bboxes[0], [1.0, 2.0, 30.0, 40.0]);
    assert_eq!(prompts.cls, vec![0, 1]);
  }

  #[test]
  fn test_prompts_json_rejects_negative_class() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prompts.json");
    std::fs::write(&path, r#"{"bboxes": [[1, 2, 30, 40]], "cls": [-1]}"#).unwrap();

    assert!(matches!(
      VisualPrompts::from_json_file(&path),
      Err(PromptError::ParseError(_))
    ));
  }

  #[test]
  fn test_parse_bbox() {
    assert_eq!(
      parse_bbox("352,185,375,207").unwrap(),
      [352.0, 185.0, 375.0, 207.0]
    );
    assert_eq!(parse_bbox(" 1.5, 2 ,3,4").unwrap(), [1.5, 2.0, 3.0, 4.0]);
    assert!(parse_bbox("1,2,3").is_err());
    assert!(parse_bbox("1,2,3,x").is_err());
  }

  #[test]
  fn test_class_names() {
    assert!(validate_class_names(&default_text_prompts()).is_ok());
    assert!(matches!(
      validate_class_names(&[]),
      Err(PromptError::NoClasses)
    ));
    assert!(matches!(
      validate_class_names(&names(&["cat", "  "])),
      Err(PromptError::BlankClass(1))
    ));
    assert!(matches!(
      validate_class_names(&names(&["cat", "dog", "cat"])),
      Err(PromptError::DuplicateClass(name)) if name == "cat"
    ));
  }

  #[test]
  fn test_class_names_differing_by_whitespace_are_duplicates() {
    assert!(matches!(
      validate_class_names(&names(&["cat", "cat "])),
      Err(PromptError::DuplicateClass(name)) if name == "cat "
    ));
    assert!(matches!(
      validate_class_names(&names(&[" flying bird", "flying bird"])),
      Err(PromptError::DuplicateClass(_))
    ));
  }

  #[test]
  fn test_unit_range() {
    assert!(check_unit_range("conf", 0.1).is_ok());
    assert!(check_unit_range("conf", 0.0).is_ok());
    assert!(check_unit_range("conf", 1.0).is_ok());
    assert!(check_unit_range("conf", 1.5).is_err());
    assert!(check_unit_range("iou", f32::NAN).is_err());
  }
}
