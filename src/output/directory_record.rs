// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, Prediction},
  output::{
    Render,
    draw::{Draw, DrawError, Record},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    source: &str,
    result: &DetectResult,
  ) -> Result<(), DirectoryRecordOutputError> {
    let mut image = image::open(source)?.to_rgb8();
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_detections_on_image(&mut image, result);
        image.save(path)?;
      }
      DrawWrapper::Record(record) => {
        image.save(path)?;
        record.record(result, path)?;
      }
    };

    Ok(())
  }
}

/// 按 `年/月/日` 目录保存结果，文件名为 `时-分-秒-源图像名.png`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let draw = match uri.query_pairs().find(|(k, _)| k == "record") {
      Some((_, v)) => DrawWrapper::Record(Record {
        label_with_name: v != "id",
      }),
      None => DrawWrapper::Draw(Box::new(Draw::from_url_query(uri)?)),
    };

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw,
    })
  }
}

impl DirectoryRecordOutput {
  fn result_path(&self, source: &str) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    let stem = Path::new(source)
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "result".to_string());
    Ok(directory.join(format!("{}-{}.png", now.format("%H-%M-%S"), stem)))
  }
}

impl Render<Prediction> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, result: &Prediction) -> Result<(), Self::Error> {
    let path = self.result_path(&result.source)?;
    self.draw.save_result(&path, &result.source, &result.result)?;
    info!("保存结果到: {}", path.display());
    Ok(())
  }
}
