// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/args.rs - 命令行共用参数
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

use clap::Args;

use crate::model::export::DEFAULT_OPSET;
use crate::model::ultralytics::DEFAULT_PYTHON;
use crate::model::{Device, ExportOptions, UltralyticsBackend};

/// 推理后端参数
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
  /// 已安装 ultralytics 的 Python 解释器
  #[arg(long, env = "YOLOE_PYTHON", default_value = DEFAULT_PYTHON, value_name = "PYTHON")]
  pub python: String,

  /// 在 CUDA 上启用 flash attention
  #[arg(long)]
  pub flash_sdp: bool,
}

impl BackendArgs {
  pub fn backend(&self) -> UltralyticsBackend {
    UltralyticsBackend::builder()
      .python(&self.python)
      .flash_sdp(self.flash_sdp)
      .build()
  }
}

/// 模型导出参数，导出格式固定为 ONNX
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
  /// 导出设备: cpu、mps、cuda:N 或 GPU 序号
  #[arg(long, default_value = "0", value_name = "DEVICE")]
  pub device: Device,

  /// ONNX opset 版本
  #[arg(long, default_value_t = DEFAULT_OPSET, value_name = "OPSET")]
  pub opset: u32,

  /// 导出后把模型文件复制到此路径
  #[arg(long, value_name = "FILE")]
  pub output: Option<PathBuf>,

  /// 导出时的输入尺寸
  #[arg(long, value_name = "SIZE")]
  pub imgsz: Option<u32>,

  /// 使用 FP16 导出
  #[arg(long)]
  pub half: bool,

  /// 是否简化 ONNX 计算图，未指定时由推理库决定
  #[arg(long, value_name = "BOOL")]
  pub simplify: Option<bool>,

  /// 使用动态输入尺寸
  #[arg(long)]
  pub dynamic: bool,
}

impl ExportArgs {
  pub fn export_options(&self) -> ExportOptions {
    ExportOptions::default()
      .device(self.device)
      .opset(self.opset)
      .imgsz(self.imgsz)
      .half(self.half)
      .simplify(self.simplify)
      .dynamic(self.dynamic)
      .output(self.output.clone())
  }
}
