// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/model/ultralytics.rs - ultralytics 推理后端
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

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::model::protocol::{ClassesSet, Exported, Loaded, Predicted, Reply, Request, TextPe};
use crate::model::{
  Backend, ExportOptions, Model, ModelError, PredictOptions, Prediction, TextEmbeddings,
};

const BRIDGE_SCRIPT: &str = include_str!("../../assets/yoloe_bridge.py");

pub const DEFAULT_PYTHON: &str = "python3";

pub struct UltralyticsBackendBuilder {
  python: String,
  flash_sdp: bool,
}

impl Default for UltralyticsBackendBuilder {
  fn default() -> Self {
    Self {
      python: DEFAULT_PYTHON.to_string(),
      flash_sdp: false,
    }
  }
}

impl UltralyticsBackendBuilder {
  /// 需要已安装 ultralytics 的 Python 解释器
  pub fn python(mut self, python: impl Into<String>) -> Self {
    self.python = python.into();
    self
  }

  /// 加载模型前在 CUDA 上启用 flash scaled-dot-product attention
  pub fn flash_sdp(mut self, flash_sdp: bool) -> Self {
    self.flash_sdp = flash_sdp;
    self
  }

  pub fn build(self) -> UltralyticsBackend {
    UltralyticsBackend {
      python: self.python,
      flash_sdp: self.flash_sdp,
    }
  }
}

/// 通过子进程驱动 ultralytics 的后端，每个模型句柄独占一个子进程
pub struct UltralyticsBackend {
  python: String,
  flash_sdp: bool,
}

impl UltralyticsBackend {
  pub fn builder() -> UltralyticsBackendBuilder {
    UltralyticsBackendBuilder::default()
  }
}

impl Backend for UltralyticsBackend {
  type Model = UltralyticsModel;

  fn load(&self, model: &str) -> Result<Self::Model, ModelError> {
    info!("启动推理进程: {}", self.python);
    let mut bridge = Bridge::spawn(&self.python)?;

    info!("加载模型: {}", model);
    let loaded: Loaded = bridge.call(&Request::Load {
      model,
      flash_sdp: self.flash_sdp,
    })?;
    debug!(
      "模型任务: {}, 类别数量: {}",
      loaded.task.as_deref().unwrap_or("unknown"),
      loaded.names.len()
    );
    info!("模型加载完成");

    Ok(UltralyticsModel {
      bridge,
      classes: loaded.names,
    })
  }
}

pub struct UltralyticsModel {
  bridge: Bridge,
  classes: Vec<String>,
}

impl Model for UltralyticsModel {
  fn classes(&self) -> &[String] {
    &self.classes
  }

  fn text_embeddings(&mut self, names: &[String]) -> Result<TextEmbeddings, ModelError> {
    let reply: TextPe = self.bridge.call(&Request::TextPe { names })?;
    let embeddings = TextEmbeddings::from_vectors(reply.embeddings)?;
    debug!(
      "文本嵌入: {} 个, 维度 {}",
      embeddings.len(),
      embeddings.dim()
    );
    Ok(embeddings)
  }

  fn set_classes(
    &mut self,
    names: &[String],
    embeddings: TextEmbeddings,
  ) -> Result<(), ModelError> {
    embeddings.check_count(names.len())?;
    let reply: ClassesSet = self.bridge.call(&Request::SetClasses {
      names,
      embeddings: embeddings.iter().collect(),
    })?;
    self.classes = reply.names;
    Ok(())
  }

  fn predict(&mut self, options: &PredictOptions) -> Result<Vec<Prediction>, ModelError> {
    check_local_source(&options.source)?;
    if let Some(refer_image) = &options.refer_image {
      check_local_source(refer_image)?;
    }

    let reply: Predicted = self.bridge.call(&Request::Predict { options })?;
    if reply.names != self.classes {
      debug!("推理后类别变为: {:?}", reply.names);
      self.classes = reply.names;
    }
    Ok(reply.results)
  }

  fn export(&mut self, options: &ExportOptions) -> Result<PathBuf, ModelError> {
    if self.classes.is_empty() {
      return Err(ModelError::EmptyClasses);
    }
    let reply: Exported = self.bridge.call(&Request::Export { options })?;
    Ok(PathBuf::from(reply.path))
  }
}

// 带协议头的来源（如 https://）交给推理库解析，其余视为本地文件
fn check_local_source(source: &str) -> Result<(), ModelError> {
  if source.contains("://") || Path::new(source).exists() {
    return Ok(());
  }
  Err(ModelError::NotFound(source.to_string()))
}

struct Bridge {
  child: Child,
  stdin: Option<ChildStdin>,
  stdout: BufReader<ChildStdout>,
}

impl Bridge {
  fn spawn(python: &str) -> Result<Self, ModelError> {
    let mut child = Command::new(python)
      .arg("-u")
      .arg("-c")
      .arg(BRIDGE_SCRIPT)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::inherit())
      .spawn()
      .map_err(ModelError::SpawnError)?;
    debug!("推理进程 PID: {}", child.id());

    match (child.stdin.take(), child.stdout.take()) {
      (Some(stdin), Some(stdout)) => Ok(Self {
        child,
        stdin: Some(stdin),
        stdout: BufReader::new(stdout),
      }),
      _ => {
        let _ = child.kill();
        let _ = child.wait();
        Err(ModelError::BridgeClosed)
      }
    }
  }

  fn call<T: DeserializeOwned>(&mut self, request: &Request<'_>) -> Result<T, ModelError> {
    let stdin = self.stdin.as_mut().ok_or(ModelError::BridgeClosed)?;

    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    debug!("发送请求: {} 字节", line.len());
    stdin
      .write_all(&line)
      .and_then(|_| stdin.flush())
      .map_err(closed_on_broken_pipe)?;

    let mut reply = String::new();
    if self.stdout.read_line(&mut reply)? == 0 {
      warn!("推理进程提前退出");
      return Err(ModelError::BridgeClosed);
    }
    debug!("收到应答: {} 字节", reply.len());

    let reply: Reply = serde_json::from_str(&reply)?;
    reply.into_result()
  }
}

fn closed_on_broken_pipe(err: std::io::Error) -> ModelError {
  if err.kind() == std::io::ErrorKind::BrokenPipe {
    ModelError::BridgeClosed
  } else {
    ModelError::IoError(err)
  }
}

impl Drop for Bridge {
  fn drop(&mut self) {
    // 关闭 stdin 后推理进程会自行退出，仍在运行则强制结束
    drop(self.stdin.take());
    match self.child.try_wait() {
      Ok(Some(status)) => debug!("推理进程已退出: {}", status),
      _ => {
        if let Err(e) = self.child.kill() {
          warn!("无法结束推理进程: {}", e);
        }
        let _ = self.child.wait();
        debug!("推理进程已结束");
      }
    }
  }
}
