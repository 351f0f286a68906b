// 该文件是 YoloE Prompt （提示引导） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{
  draw_filled_rect_mut, draw_hollow_rect_mut, draw_polygon_mut, draw_text_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::model::{DetectItem, DetectResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BORDER_THICKNESS: i32 = 2;
const MASK_OPACITY: u8 = 128;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的字体文件")]
  InvalidFont,
}

pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  border_thickness: i32,
  mask_opacity: u8,
  font: Option<FontArc>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      border_thickness: BORDER_THICKNESS,
      mask_opacity: MASK_OPACITY,
      font: None,
    }
  }
}

impl Draw {
  /// 没有字体时只绘制边框
  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data).map_err(|_| DrawError::InvalidFont)?;
    Ok(Self {
      font: Some(font),
      ..Self::default()
    })
  }

  /// 读取 URL 中的 `font` 参数
  pub fn from_url_query(url: &Url) -> Result<Self, DrawError> {
    match url.query_pairs().find(|(k, _)| k == "font") {
      Some((_, path)) => {
        debug!("加载标签字体: {}", path);
        Self::with_font_file(&*path)
      }
      None => Ok(Self::default()),
    }
  }

  /// 先叠加分割掩码，再绘制边框与标签
  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      if let Some(mask) = &item.mask {
        self.blend_mask(image, mask, class_color(item.class_id));
      }
    }
    for item in result.items.iter() {
      self.draw_bbox_with_label(image, item);
    }
  }

  fn blend_mask(&self, image: &mut RgbImage, polygon: &[[f32; 2]], color: Rgb<u8>) {
    let mut points: Vec<Point<i32>> = Vec::with_capacity(polygon.len());
    for [x, y] in polygon {
      let point = Point::new(x.round() as i32, y.round() as i32);
      if points.last() != Some(&point) {
        points.push(point);
      }
    }
    if points.len() > 1 && points.first() == points.last() {
      points.pop();
    }
    if points.len() < 3 {
      return;
    }

    let mut coverage = GrayImage::new(image.width(), image.height());
    draw_polygon_mut(&mut coverage, &points, Luma([255u8]));

    let alpha = self.mask_opacity as u16;
    for (pixel, covered) in image.pixels_mut().zip(coverage.pixels()) {
      if covered[0] == 0 {
        continue;
      }
      for (channel, tint) in pixel.0.iter_mut().zip(color.0) {
        *channel = ((*channel as u16 * (255 - alpha) + tint as u16 * alpha) / 255) as u8;
      }
    }
  }

  // bbox 为像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &DetectItem) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (item.bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (item.bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (item.bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (item.bbox[3].ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = class_color(item.class_id);

    for t in 0..self.border_thickness {
      let (x0, y0, x1, y1) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if x0 >= x1 || y0 >= y1 {
        break;
      }
      let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };

    // 标签放在边框上方
    let label = format!("{} {:.2}", item.name, item.score);
    let text_width = (label.chars().count() as f32 * self.label_char_width) as i32;
    let label_x = x_min;
    let label_y = (y_min - self.label_text_height).max(0);
    let label_width = text_width.min(w - label_x).max(0) as u32;
    let label_height = self.label_text_height as u32;

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        Rgb([255u8, 255u8, 255u8]),
        label_x,
        label_y + self.label_text_vertical_padding,
        PxScale::from(self.font_size),
        font,
        &label,
      );
    }
  }
}

/// 每个类别一个固定颜色
pub fn class_color(class_id: u32) -> Rgb<u8> {
  let hue = ((class_id as f32) * 47.0) % 360.0;
  hsv_to_rgb(hue, 0.8, 0.9)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = match h as u32 {
    0..=59 => (c, x, 0.0),
    60..=119 => (x, c, 0.0),
    120..=179 => (0.0, c, x),
    180..=239 => (0.0, x, c),
    240..=299 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

/// 以文本形式记录检测结果，每行一个对象
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn record(&self, result: &DetectResult, path: &Path) -> Result<(), std::io::Error> {
    let records: Vec<String> = result
      .items
      .iter()
      .map(|item| {
        let name = if self.label_with_name {
          item.name.clone()
        } else {
          item.class_id.to_string()
        };
        format!(
          "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}",
          name, item.score, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]
        )
      })
      .collect();
    std::fs::write(path.with_extension("txt"), records.join("\n"))
  }
}
