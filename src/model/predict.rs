// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/model/predict.rs - 预测参数
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

use serde::Serialize;

use crate::model::prompt::{PromptError, VisualPrompts, check_unit_range};

/// 视觉提示匹配的原始得分偏低，默认阈值比常规检测更低
pub const DEFAULT_VISUAL_CONFIDENCE: f32 = 0.1;
pub const DEFAULT_IOU: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
  /// 推理库的默认预测器
  Default,
  /// 视觉提示引导的分割
  #[default]
  VisualPromptSeg,
  /// 视觉提示引导的检测
  VisualPromptDetect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictOptions {
  pub source: String,
  pub refer_image: Option<String>,
  pub visual_prompts: Option<VisualPrompts>,
  pub predictor: PredictorKind,
  pub conf: f32,
  pub iou: f32,
}

impl PredictOptions {
  pub fn new(source: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      refer_image: None,
      visual_prompts: None,
      predictor: PredictorKind::Default,
      conf: DEFAULT_VISUAL_CONFIDENCE,
      iou: DEFAULT_IOU,
    }
  }

  /// 以参考图像上的视觉提示引导目标图像的检测
  pub fn with_visual_prompts(
    mut self,
    refer_image: impl Into<String>,
    prompts: VisualPrompts,
  ) -> Self {
    self.refer_image = Some(refer_image.into());
    self.visual_prompts = Some(prompts);
    if self.predictor == PredictorKind::Default {
      self.predictor = PredictorKind::VisualPromptSeg;
    }
    self
  }

  pub fn predictor(mut self, predictor: PredictorKind) -> Self {
    self.predictor = predictor;
    self
  }

  pub fn conf(mut self, conf: f32) -> Self {
    self.conf = conf;
    self
  }

  pub fn iou(mut self, iou: f32) -> Self {
    self.iou = iou;
    self
  }

  pub fn validate(&self) -> Result<(), PromptError> {
    if let Some(prompts) = &self.visual_prompts {
      prompts.validate()?;
    }
    check_unit_range("conf", self.conf)?;
    check_unit_range("iou", self.iou)?;
    Ok(())
  }
}
