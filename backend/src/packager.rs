use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpRequest, HttpResponse};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use shared::ClassificationScore;
use std::io::{Cursor, Write};

use crate::processing::chart::Canvas;
use crate::processing::{Artifact, ProcessingError};

pub const TOP_N: usize = 5;
pub const SCORES_FILE_NAME: &str = "classification_scores.json";
pub const PLOT_FILE_NAME: &str = "top5_scores.png";

const BAR_COLORS: [[u8; 3]; 5] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
];

#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("Invalid scores payload: {0}")]
    InvalidScores(#[from] serde_json::Error),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Failed to render chart: {0}")]
    Render(#[from] ProcessingError),
    #[error("Failed to build download link: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport form of an artifact, ready to embed in a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Packaged {
    Scores {
        json: String,
        top: Vec<ClassificationScore>,
        download_query: String,
    },
    Image {
        data_uri: String,
    },
}

pub fn package(artifact: &Artifact) -> Result<Packaged, PackagingError> {
    match artifact {
        Artifact::Scores(scores) => {
            let json = scores_to_json(scores)?;
            let download_query = serde_urlencoded::to_string(&[("scores", json.as_str())])?;
            Ok(Packaged::Scores {
                json,
                top: top_n(scores, TOP_N),
                download_query,
            })
        }
        Artifact::Transformed(image) | Artifact::Histogram(image) => Ok(Packaged::Image {
            data_uri: data_uri(image)?,
        }),
    }
}

/// Compact JSON array of `[label, score]` pairs, in artifact order.
pub fn scores_to_json(scores: &[ClassificationScore]) -> Result<String, PackagingError> {
    Ok(serde_json::to_string(scores)?)
}

pub fn scores_from_json(raw: &str) -> Result<Vec<ClassificationScore>, PackagingError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, PackagingError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| PackagingError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}

pub fn data_uri(image: &DynamicImage) -> Result<String, PackagingError> {
    let png = encode_png(image)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Highest `n` scores, best first. Ties keep their original order.
pub fn top_n(scores: &[ClassificationScore], n: usize) -> Vec<ClassificationScore> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.score().total_cmp(&a.score()));
    sorted.truncate(n);
    sorted
}

/// A rendered bar chart and the bars it shows, left to right.
#[derive(Debug, Clone)]
pub struct BarChart {
    pub bars: Vec<ClassificationScore>,
    pub png: Vec<u8>,
}

/// Renders the top scores as a bar chart. Each bar's label and score are
/// written to the PNG text metadata as `label-<n>` / `score-<n>`. Text that
/// Latin-1 cannot hold goes into an iTXt chunk instead of tEXt.
pub fn top_scores_chart(scores: &[ClassificationScore]) -> Result<BarChart, PackagingError> {
    let bars = top_n(scores, TOP_N);

    let mut canvas = Canvas::new(640, 400, 32.0)?;
    let area = canvas.area();
    let peak = bars
        .iter()
        .map(|s| s.score())
        .fold(0.0f32, f32::max)
        .max(f32::EPSILON);
    let slot = area.width / TOP_N as f32;

    for (i, bar) in bars.iter().enumerate() {
        let height = (bar.score().max(0.0) / peak) * area.height;
        let [r, g, b] = BAR_COLORS[i % BAR_COLORS.len()];
        canvas.fill_rect(
            area.left + slot * i as f32 + slot * 0.15,
            area.bottom() - height,
            slot * 0.7,
            height,
            [r, g, b, 255],
        );
    }
    canvas.draw_axes();

    let mut text = vec![("Title".to_string(), "Top 5 classification scores".to_string())];
    for (i, bar) in bars.iter().enumerate() {
        text.push((format!("label-{}", i + 1), bar.label().to_string()));
        text.push((format!("score-{}", i + 1), format!("{:.4}", bar.score())));
    }

    let image = canvas.into_image();
    let png = encode_png_with_text(image.width(), image.height(), image.as_raw(), &text)?;
    Ok(BarChart { bars, png })
}

fn encode_png_with_text(
    width: u32,
    height: u32,
    rgba: &[u8],
    text: &[(String, String)],
) -> Result<Vec<u8>, PackagingError> {
    let encode_err = |e: png::EncodingError| PackagingError::Encode(e.to_string());
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        for (keyword, value) in text {
            let added = if is_latin1(value) {
                encoder.add_text_chunk(keyword.clone(), value.clone())
            } else {
                encoder.add_itxt_chunk(keyword.clone(), value.clone())
            };
            added.map_err(encode_err)?;
        }
        let mut writer = encoder.write_header().map_err(encode_err)?;
        writer.write_image_data(rgba).map_err(encode_err)?;
        writer.finish().map_err(encode_err)?;
    }
    Ok(out)
}

fn is_latin1(text: &str) -> bool {
    text.chars().all(|c| u32::from(c) <= 0xFF)
}

/// A file offered for download.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
}

impl Download {
    pub fn scores(scores: &[ClassificationScore]) -> Result<Self, PackagingError> {
        Ok(Self {
            file_name: SCORES_FILE_NAME,
            bytes: scores_to_json(scores)?.into_bytes(),
        })
    }

    pub fn plot(scores: &[ClassificationScore]) -> Result<Self, PackagingError> {
        let chart = top_scores_chart(scores)?;
        log::debug!(
            "Plotting {:?}",
            chart.bars.iter().map(|s| s.label()).collect::<Vec<_>>()
        );
        Ok(Self {
            file_name: PLOT_FILE_NAME,
            bytes: chart.png,
        })
    }

    /// Streams the artifact as an attachment from a temporary file. The file
    /// is unlinked before this returns; the response keeps the open handle.
    pub fn into_response(self, req: &HttpRequest) -> Result<HttpResponse, PackagingError> {
        let mut tmp = tempfile::Builder::new().prefix("imagelab-").tempfile()?;
        tmp.write_all(&self.bytes)?;
        tmp.flush()?;
        let file = tmp.reopen()?;
        log::debug!(
            "Serving {} ({} bytes) from {}",
            self.file_name,
            self.bytes.len(),
            tmp.path().display()
        );

        let named = NamedFile::from_file(file, self.file_name)?.set_content_disposition(
            ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(self.file_name.to_string())],
            },
        );
        let response = named.into_response(req);
        drop(tmp);
        Ok(response)
    }
}
