//! 複数画像の一括読み取り
//!
//! 画像ごとの処理は逐次だが、画像同士は状態を共有しないので rayon で並列に回す。

use super::{DecodeOrchestrator, DecodeOutcome, SymbolDecoder};
use crate::error::Result;
use crate::imaging;
use crate::scanner::ImageInfo;
use indicatif::ProgressBar;
use rayon::prelude::*;

/// 1画像分の読み取り結果
#[derive(Debug)]
pub struct BatchItem {
    pub image: ImageInfo,
    pub result: Result<DecodeOutcome>,
}

/// 画像を並列に読み取る（結果は入力順）
pub fn decode_images<D: SymbolDecoder>(
    orchestrator: &DecodeOrchestrator<D>,
    images: &[ImageInfo],
    progress: Option<&ProgressBar>,
) -> Vec<BatchItem> {
    images
        .par_iter()
        .map(|info| {
            let result = imaging::load_image(&info.path)
                .and_then(|image| orchestrator.decode_detailed(&image));
            if let Some(pb) = progress {
                pb.inc(1);
            }
            BatchItem {
                image: info.clone(),
                result,
            }
        })
        .collect()
}
