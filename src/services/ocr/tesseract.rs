//! Tesseract CLI engine.
//!
//! Pipes the image into `tesseract stdin stdout -l <lang> tsv` and rebuilds
//! text blocks from the TSV rows: level-2 rows give each block's box, level-5
//! rows carry the words that belong to it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::OcrEngine;
use crate::core::config::OcrConfig;
use crate::core::errors::{OcrError, OcrResult};
use crate::core::types::{BoundingBox, OcrBlock};

const LEVEL_BLOCK: u32 = 2;
const LEVEL_WORD: u32 = 5;
const TSV_COLUMNS: usize = 12;

pub struct TesseractEngine {
    binary: String,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_path.clone(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    async fn recognize(&self, image: &[u8], language: &str) -> OcrResult<Vec<OcrBlock>> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", language, "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(OcrError::Spawn)?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::InvalidOutput("tesseract stdin unavailable".to_string()))?;
        let input = image.to_vec();
        let writer = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        let written = writer
            .await
            .map_err(|e| OcrError::InvalidOutput(format!("stdin writer failed: {}", e)))?;

        // an engine that rejects the image closes stdin early; report its exit first
        if !output.status.success() {
            return Err(OcrError::EngineFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        let tsv = String::from_utf8(output.stdout)
            .map_err(|e| OcrError::InvalidOutput(format!("non UTF-8 output: {}", e)))?;
        let blocks = parse_tsv_blocks(&tsv)?;
        debug!("Tesseract reported {} blocks", blocks.len());
        Ok(blocks)
    }
}

struct BlockBuilder {
    bbox: Option<BoundingBox>,
    words: Vec<String>,
}

/// Ids and pixel positions are unsigned; a negative value is malformed output.
fn parse_column<T: std::str::FromStr>(columns: &[&str], i: usize, line_no: usize) -> OcrResult<T> {
    columns[i].trim().parse().map_err(|_| {
        OcrError::InvalidOutput(format!("line {}: bad number {:?}", line_no + 1, columns[i]))
    })
}

/// Group TSV word rows into blocks, in the order blocks first appear.
/// Blocks with a degenerate box are skipped.
pub fn parse_tsv_blocks(tsv: &str) -> OcrResult<Vec<OcrBlock>> {
    let mut order: Vec<(u32, u32)> = Vec::new();
    let mut blocks: HashMap<(u32, u32), BlockBuilder> = HashMap::new();

    for (line_no, line) in tsv.lines().enumerate() {
        if line.is_empty() || line.starts_with("level") {
            continue;
        }

        let columns: Vec<&str> = line.splitn(TSV_COLUMNS, '\t').collect();
        if columns.len() < TSV_COLUMNS - 1 {
            return Err(OcrError::InvalidOutput(format!(
                "line {} has {} columns",
                line_no + 1,
                columns.len()
            )));
        }

        let id = |i: usize| -> OcrResult<u32> { parse_column(&columns, i, line_no) };
        let coord = |i: usize| -> OcrResult<f64> {
            parse_column::<u32>(&columns, i, line_no).map(f64::from)
        };

        let level = id(0)?;
        let key = (id(1)?, id(2)?);

        let entry = blocks.entry(key).or_insert_with(|| {
            order.push(key);
            BlockBuilder {
                bbox: None,
                words: Vec::new(),
            }
        });

        match level {
            LEVEL_BLOCK => {
                let (left, top) = (coord(6)?, coord(7)?);
                let (width, height) = (coord(8)?, coord(9)?);
                entry.bbox = BoundingBox::new(left, top, left + width, top + height);
            }
            LEVEL_WORD => {
                let text = columns.get(11).copied().unwrap_or_default();
                if !text.trim().is_empty() {
                    entry.words.push(text.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|key| {
            let builder = blocks.remove(&key)?;
            Some(OcrBlock {
                text: builder.words.join(" "),
                bbox: builder.bbox?,
            })
        })
        .collect())
}
