//! rxing によるバーコードデコーダ
//!
//! 設定の形式をそのまま読み取りヒントに渡す（Code128/39/93, EAN-13/8, UPC-A, QR）。
//! rxing はチェックディジット・誤り訂正を通った文字列しか返さないため、要素誤差は0として報告する。
//! 大きいパッチサイズは TRY_HARDER（行の走査を増やし、回転も試す）に対応させる。

use super::{DecoderConfig, PatchSize, RawDecode, SymbolDecoder, SymbolFormat};
use crate::error::Result;
use crate::imaging;
use image::{imageops, RgbaImage};
use rxing::common::HybridBinarizer;
use rxing::{
    BarcodeFormat, BinaryBitmap, DecodeHintType, DecodeHintValue, DecodingHintDictionary,
    Luma8LuminanceSource, MultiFormatReader, Reader,
};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use tracing::debug;

fn barcode_format(format: SymbolFormat) -> BarcodeFormat {
    match format {
        SymbolFormat::Code128 => BarcodeFormat::CODE_128,
        SymbolFormat::Code39 => BarcodeFormat::CODE_39,
        SymbolFormat::Code93 => BarcodeFormat::CODE_93,
        SymbolFormat::Ean13 => BarcodeFormat::EAN_13,
        SymbolFormat::Ean8 => BarcodeFormat::EAN_8,
        SymbolFormat::UpcA => BarcodeFormat::UPC_A,
        SymbolFormat::Qr => BarcodeFormat::QR_CODE,
    }
}

fn hints_for(config: &DecoderConfig) -> DecodingHintDictionary {
    let formats: HashSet<BarcodeFormat> = config.formats.iter().copied().map(barcode_format).collect();
    let try_harder = matches!(config.patch_size, PatchSize::Large | PatchSize::XLarge);

    let mut hints: DecodingHintDictionary = HashMap::new();
    hints.insert(
        DecodeHintType::POSSIBLE_FORMATS,
        DecodeHintValue::PossibleFormats(formats),
    );
    hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(try_harder));
    hints
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BarcodeDecoder;

impl BarcodeDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolDecoder for BarcodeDecoder {
    fn decode(&self, image: &RgbaImage, config: &DecoderConfig) -> Result<Option<RawDecode>> {
        if config.formats.is_empty() {
            return Ok(None);
        }

        let input = if config.half_sample {
            let half = (image.width().max(image.height()) / 2).max(1);
            imaging::fit_within(image, half)
        } else {
            Cow::Borrowed(image)
        };

        let luma = imageops::grayscale(&*input);
        let (width, height) = luma.dimensions();
        let source = Luma8LuminanceSource::new(luma.into_raw(), width, height);
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));

        let mut reader = MultiFormatReader::default();
        match reader.decode_with_hints(&mut bitmap, &hints_for(config)) {
            Ok(result) => {
                debug!(config = config.id, format = ?result.getBarcodeFormat(), "symbol found");
                Ok(Some(RawDecode::validated(result.getText())))
            }
            // 見つからない・チェックディジット不一致はどれも「結果なし」
            Err(e) => {
                debug!(config = config.id, error = %e, "no symbol");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::default_strategies;
    use image::Rgba;
    use rxing::{MultiFormatWriter, Writer};

    const QUIET_ZONE: u32 = 20;

    /// rxing のライターで描いたバーコード画像（白地に黒、周囲に余白）
    fn barcode_image(contents: &str, format: BarcodeFormat) -> RgbaImage {
        let matrix = MultiFormatWriter::default()
            .encode(contents, &format, 360, 120)
            .unwrap();
        let (width, height) = (matrix.getWidth(), matrix.getHeight());

        RgbaImage::from_fn(width + QUIET_ZONE * 2, height + QUIET_ZONE * 2, |x, y| {
            let inside = x >= QUIET_ZONE
                && y >= QUIET_ZONE
                && x < width + QUIET_ZONE
                && y < height + QUIET_ZONE;
            if inside && matrix.get(x - QUIET_ZONE, y - QUIET_ZONE) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn test_hints_follow_config_formats() {
        let strategies = default_strategies();
        let hints = hints_for(&strategies[0].config);
        match hints.get(&DecodeHintType::POSSIBLE_FORMATS) {
            Some(DecodeHintValue::PossibleFormats(formats)) => {
                assert_eq!(formats, &HashSet::from([BarcodeFormat::CODE_128]));
            }
            _ => panic!("形式ヒントがない"),
        }
    }

    #[test]
    fn test_decodes_code128() {
        let strategies = default_strategies();
        let image = barcode_image("PN-7781", BarcodeFormat::CODE_128);
        let raw = BarcodeDecoder::new().decode(&image, &strategies[0].config).unwrap().unwrap();
        assert_eq!(raw.text, "PN-7781");
        assert_eq!(raw.mean_error(), 0.0);
    }

    #[test]
    fn test_format_outside_config_is_ignored() {
        let strategies = default_strategies();
        let image = barcode_image("ABC123", BarcodeFormat::CODE_39);
        // 1番目は Code128 のみ
        assert!(BarcodeDecoder::new().decode(&image, &strategies[0].config).unwrap().is_none());
        // 3番目は Code128 + Code39
        let raw = BarcodeDecoder::new().decode(&image, &strategies[2].config).unwrap().unwrap();
        assert_eq!(raw.text, "ABC123");
    }

    #[test]
    fn test_blank_image_has_no_symbol() {
        let strategies = default_strategies();
        let config = &strategies.last().unwrap().config;
        let blank = RgbaImage::from_pixel(64, 64, Rgba([255, 255, 255, 255]));
        assert!(BarcodeDecoder::new().decode(&blank, config).unwrap().is_none());
    }
}
