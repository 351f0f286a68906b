// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/bin/predict_visual_prompt.rs - 视觉提示推理程序
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

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use yoloe_prompt::{
  FromUrl,
  args::{BackendArgs, ExportArgs},
  model::{
    DEFAULT_MODEL, PredictorKind, VisualPrompts,
    predict::{DEFAULT_IOU, DEFAULT_VISUAL_CONFIDENCE},
    prompt::parse_bbox,
  },
  output::OutputWrapper,
  task::{Task, VisualPromptPredictTask},
};

/// 用参考图像上的视觉提示引导 YoloE 推理，显示结果并导出 ONNX 模型
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// YoloE 模型权重
  #[arg(long, default_value = DEFAULT_MODEL, value_name = "MODEL")]
  pub model: String,
  /// 目标图像
  #[arg(long, default_value = "target_image.jpg", value_name = "SOURCE")]
  pub source: String,
  /// 提供视觉提示的参考图像
  #[arg(long, default_value = "visual_prompt.jpg", value_name = "IMAGE")]
  pub refer_image: String,
  /// 参考图像上的边界框 `left,top,right,bottom`，可重复指定
  #[arg(long = "bbox", value_name = "BOX", value_parser = parse_bbox)]
  pub bboxes: Vec<[f32; 4]>,
  /// 与边界框一一对应的类别编号
  #[arg(long = "cls", value_name = "ID")]
  pub cls: Vec<u32>,
  /// 从 JSON 文件读取视觉提示，与 --bbox/--cls 互斥
  #[arg(long, value_name = "FILE", conflicts_with_all = ["bboxes", "cls"])]
  pub prompts: Option<PathBuf>,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_VISUAL_CONFIDENCE, value_name = "THRESHOLD")]
  pub conf: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU, value_name = "THRESHOLD")]
  pub iou: f32,
  /// 预测器
  #[arg(long, value_enum, default_value_t = PredictorKind::VisualPromptSeg)]
  pub predictor: PredictorKind,
  /// 结果显示方式: log:、image:///path/out.jpg 或 folder:///dir
  #[arg(long, default_value = "log:", value_name = "DISPLAY")]
  pub display: Url,
  #[command(flatten)]
  pub export: ExportArgs,
  #[command(flatten)]
  pub backend: BackendArgs,
}

impl Args {
  fn visual_prompts(&self) -> Result<VisualPrompts> {
    if let Some(path) = &self.prompts {
      return Ok(VisualPrompts::from_json_file(path)?);
    }
    if self.bboxes.is_empty() && self.cls.is_empty() {
      warn!("未指定视觉提示，使用默认边界框");
      return Ok(VisualPrompts::default());
    }
    Ok(VisualPrompts::new(self.bboxes.clone(), self.cls.clone()))
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let prompts = args.visual_prompts()?;

  info!("模型文件: {}", args.model);
  info!("目标图像: {}", args.source);
  info!("参考图像: {}", args.refer_image);
  info!("视觉提示: {:?} -> {:?}", prompts.bboxes, prompts.cls);
  info!("显示方式: {}", args.display);

  let output = OutputWrapper::from_url(&args.display)?;
  let backend = args.backend.backend();
  let result = VisualPromptPredictTask::new(
    args.model,
    args.source,
    args.refer_image,
    prompts,
    output,
  )
  .predictor(args.predictor)
  .conf(args.conf)
  .iou(args.iou)
  .export(args.export.export_options())
  .run_task(&backend)?;

  let detections: usize = result.predictions.iter().map(|p| p.result.len()).sum();
  info!(
    "{} 张图像, 共 {} 个检测结果, 模型已导出: {}",
    result.predictions.len(),
    detections,
    result.artifact.display()
  );

  Ok(())
}
