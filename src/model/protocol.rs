// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/model/protocol.rs - 推理进程通信协议
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

// 每行一个 JSON 对象，请求以 `op` 区分，应答为 {"ok": true, "result": ...}
// 或 {"ok": false, "error": "..."}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::{ExportOptions, ModelError, PredictOptions, Prediction};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Request<'a> {
  Load {
    model: &'a str,
    flash_sdp: bool,
  },
  TextPe {
    names: &'a [String],
  },
  SetClasses {
    names: &'a [String],
    embeddings: Vec<&'a [f32]>,
  },
  Predict {
    #[serde(flatten)]
    options: &'a PredictOptions,
  },
  Export {
    #[serde(flatten)]
    options: &'a ExportOptions,
  },
}

#[derive(Debug, Deserialize)]
pub(crate) struct Reply {
  ok: bool,
  #[serde(default)]
  error: Option<String>,
  #[serde(default)]
  result: serde_json::Value,
}

impl Reply {
  pub(crate) fn into_result<T: DeserializeOwned>(self) -> Result<T, ModelError> {
    if !self.ok {
      let message = self.error.unwrap_or_else(|| "未知错误".to_string());
      return Err(ModelError::LibraryError(message));
    }
    Ok(serde_json::from_value(self.result)?)
  }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Loaded {
  pub names: Vec<String>,
  #[serde(default)]
  pub task: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextPe {
  pub embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassesSet {
  pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Predicted {
  pub results: Vec<Prediction>,
  /// 推理后模型的类别，视觉提示会替换原有类别
  pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Exported {
  pub path: String,
}
