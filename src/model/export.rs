// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/model/export.rs - 模型导出参数
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

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

pub const MIN_OPSET: u32 = 7;
pub const MAX_OPSET: u32 = 21;
pub const DEFAULT_OPSET: u32 = 17;

#[derive(Error, Debug)]
pub enum ExportOptionError {
  #[error("不支持的导出格式: {0}")]
  UnsupportedFormat(String),
  #[error("不支持的设备: {0}")]
  UnsupportedDevice(String),
  #[error("不支持的 opset 版本 {}，支持范围为 {}..={}", .0, MIN_OPSET, MAX_OPSET)]
  UnsupportedOpset(u32),
  #[error("导出文件不存在: {}", .0.display())]
  MissingArtifact(PathBuf),
  #[error("无效的目标路径: {}", .0.display())]
  InvalidDestination(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
  #[default]
  Onnx,
}

impl ExportFormat {
  pub fn extension(&self) -> &'static str {
    match self {
      ExportFormat::Onnx => "onnx",
    }
  }
}

impl FromStr for ExportFormat {
  type Err = ExportOptionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "onnx" => Ok(ExportFormat::Onnx),
      _ => Err(ExportOptionError::UnsupportedFormat(s.to_string())),
    }
  }
}

impl fmt::Display for ExportFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.extension())
  }
}

/// 导出时使用的计算设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
  Cpu,
  Cuda(u32),
  Mps,
}

impl Default for Device {
  fn default() -> Self {
    Device::Cuda(0)
  }
}

impl FromStr for Device {
  type Err = ExportOptionError;

  /// 支持 `cpu`、`mps`、`cuda`、`cuda:N` 以及纯数字 `N`
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.trim().to_lowercase();
    let unsupported = || ExportOptionError::UnsupportedDevice(s.to_string());
    match lower.as_str() {
      "cpu" => Ok(Device::Cpu),
      "mps" => Ok(Device::Mps),
      "cuda" => Ok(Device::Cuda(0)),
      other => {
        let index = other.strip_prefix("cuda:").unwrap_or(other);
        index.parse::<u32>().map(Device::Cuda).map_err(|_| unsupported())
      }
    }
  }
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Cpu => write!(f, "cpu"),
      Device::Cuda(index) => write!(f, "{}", index),
      Device::Mps => write!(f, "mps"),
    }
  }
}

// 推理库以整数表示 GPU 编号，以字符串表示其它设备
impl Serialize for Device {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Device::Cpu => serializer.serialize_str("cpu"),
      Device::Cuda(index) => serializer.serialize_u32(*index),
      Device::Mps => serializer.serialize_str("mps"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportOptions {
  pub format: ExportFormat,
  pub device: Device,
  pub opset: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub imgsz: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub half: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub simplify: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub dynamic: Option<bool>,
  /// 导出完成后把模型文件放到此路径，未设置时保留推理库的默认位置
  #[serde(skip)]
  pub output: Option<PathBuf>,
}

impl Default for ExportOptions {
  fn default() -> Self {
    Self {
      format: ExportFormat::Onnx,
      device: Device::default(),
      opset: DEFAULT_OPSET,
      imgsz: None,
      half: None,
      simplify: None,
      dynamic: None,
      output: None,
    }
  }
}

impl ExportOptions {
  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn opset(mut self, opset: u32) -> Self {
    self.opset = opset;
    self
  }

  pub fn imgsz(mut self, imgsz: Option<u32>) -> Self {
    self.imgsz = imgsz;
    self
  }

  pub fn half(mut self, half: bool) -> Self {
    self.half = half.then_some(true);
    self
  }

  pub fn simplify(mut self, simplify: Option<bool>) -> Self {
    self.simplify = simplify;
    self
  }

  pub fn dynamic(mut self, dynamic: bool) -> Self {
    self.dynamic = dynamic.then_some(true);
    self
  }

  pub fn output(mut self, output: Option<PathBuf>) -> Self {
    self.output = output;
    self
  }

  pub fn validate(&self) -> Result<(), ExportOptionError> {
    if !(MIN_OPSET..=MAX_OPSET).contains(&self.opset) {
      return Err(ExportOptionError::UnsupportedOpset(self.opset));
    }
    if let Some(output) = &self.output
      && output.file_name().is_none()
    {
      return Err(ExportOptionError::InvalidDestination(output.clone()));
    }
    Ok(())
  }
}

/// 将导出的模型文件复制到目标路径
///
/// 先写入同目录下的临时文件再重命名，目标路径上要么没有文件，要么是完整的文件。
/// 失败时临时文件随 `NamedTempFile` 一起删除。
pub fn persist_artifact(artifact: &Path, destination: &Path) -> Result<PathBuf, ExportOptionError> {
  if !artifact.is_file() {
    return Err(ExportOptionError::MissingArtifact(artifact.to_path_buf()));
  }

  let file_name = destination
    .file_name()
    .ok_or_else(|| ExportOptionError::InvalidDestination(destination.to_path_buf()))?;

  let parent = match destination.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  std::fs::create_dir_all(parent)?;

  let prefix = format!(".{}.", file_name.to_string_lossy());
  let mut partial = tempfile::Builder::new()
    .prefix(&prefix)
    .suffix(".partial")
    .tempfile_in(parent)?;
  debug!("写入临时文件: {}", partial.path().display());

  let mut source = File::open(artifact)?;
  io::copy(&mut source, partial.as_file_mut())?;
  partial.as_file().sync_all()?;

  partial.persist(destination).map_err(|e| {
    warn!("无法放置模型文件: {}", destination.display());
    ExportOptionError::IoError(e.error)
  })?;

  Ok(destination.to_path_buf())
}
