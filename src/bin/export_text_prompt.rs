// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/bin/export_text_prompt.rs - 文本提示导出程序
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use yoloe_prompt::{
  args::{BackendArgs, ExportArgs},
  model::{DEFAULT_MODEL, prompt::default_text_prompts},
  task::{Task, TextPromptExportTask},
};

/// 用文本提示设置 YoloE 的类别并导出为 ONNX 模型
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// YoloE 模型权重
  #[arg(long, default_value = DEFAULT_MODEL, value_name = "MODEL")]
  pub model: String,
  /// 文本提示，可重复指定，未指定时使用内置的四个类别
  #[arg(long = "name", value_name = "NAME")]
  pub names: Vec<String>,
  #[command(flatten)]
  pub export: ExportArgs,
  #[command(flatten)]
  pub backend: BackendArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let names = if args.names.is_empty() {
    default_text_prompts()
  } else {
    args.names
  };

  info!("模型文件: {}", args.model);
  info!("文本提示: {:?}", names);
  info!("Python 解释器: {}", args.backend.python);

  let backend = args.backend.backend();
  let output = TextPromptExportTask::new(args.model, names)
    .export(args.export.export_options())
    .run_task(&backend)?;

  info!(
    "已导出 {} 个类别 (嵌入维度 {}): {}",
    output.classes.len(),
    output.embedding_dim,
    output.artifact.display()
  );

  Ok(())
}
