//! 画像前処理モジュール
//!
//! 照明や印刷品質の違いを吸収するため、入力画像から読み取り用の別バリアントを作る。
//! どのバリアントも入力だけから決まる純粋関数で、順序や並列実行に依存しない。
//!
//! ## バリアント
//! - Original: リサイズのみ
//! - ContrastStretch: ヒストグラムの5%/95%点で伸張し、ガンマで中間調を持ち上げる
//! - Grayscale: 輝度 (0.299R + 0.587G + 0.114B) を3チャンネルに複製
//! - Inverted: 255 - 値（白抜きラベル用）
//! - Sharpened: 線形コントラスト + 3x3シャープ化
//! - Rotated90: 横向きに撮られた写真用

pub mod exif;

use crate::config::PipelineConfig;
use crate::error::{IntakeError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

/// 前処理バリアント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Original,
    ContrastStretch,
    Grayscale,
    Inverted,
    Sharpened,
    Rotated90,
}

impl Variant {
    pub const ALL: [Variant; 6] = [
        Variant::Original,
        Variant::ContrastStretch,
        Variant::Grayscale,
        Variant::Inverted,
        Variant::Sharpened,
        Variant::Rotated90,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::ContrastStretch => "contrast_stretch",
            Variant::Grayscale => "grayscale",
            Variant::Inverted => "inverted",
            Variant::Sharpened => "sharpened",
            Variant::Rotated90 => "rotated90",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 前処理オプション
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerOptions {
    pub target_size: u32,
    pub max_upscale: f32,
    pub gamma: f32,
    pub low_percentile: f32,
    pub high_percentile: f32,
    pub sharpen_contrast: f32,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for NormalizerOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            target_size: config.target_size,
            max_upscale: config.max_upscale,
            gamma: config.gamma,
            low_percentile: config.low_percentile,
            high_percentile: config.high_percentile,
            sharpen_contrast: config.sharpen_contrast,
        }
    }
}

/// 画像ファイルを読み込み、EXIFの向きを補正する
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(IntakeError::FileNotFound(path.display().to_string()));
    }

    let image = image::open(path)
        .map_err(|e| IntakeError::ImageLoad(format!("{}: {}", path.display(), e)))?;

    let orientation = File::open(path)
        .ok()
        .and_then(|file| exif::read_orientation(&mut BufReader::new(file)));

    Ok(match orientation {
        Some(o) => exif::apply_orientation(image, o),
        None => image,
    })
}

/// メモリ上の画像（アップロードされたバイト列）を読み込む
pub fn load_image_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| IntakeError::ImageLoad(e.to_string()))?;

    Ok(match exif::read_orientation(&mut Cursor::new(bytes)) {
        Some(o) => exif::apply_orientation(image, o),
        None => image,
    })
}

/// バリアントを生成する（リサイズ後に変換）
pub fn render(source: &RgbaImage, variant: Variant, options: &NormalizerOptions) -> RgbaImage {
    let base = resize_for_decoding(source, options.target_size, options.max_upscale);

    match variant {
        Variant::Original => base.into_owned(),
        Variant::ContrastStretch => contrast_stretch(&base, options),
        Variant::Grayscale => grayscale(&base),
        Variant::Inverted => invert(&base),
        Variant::Sharpened => sharpen(&base, options.sharpen_contrast),
        Variant::Rotated90 => imageops::rotate90(&*base),
    }
}

/// 長辺を `target` に合わせる倍率（拡大は `max_upscale` まで）
pub fn decode_scale(width: u32, height: u32, target: u32, max_upscale: f32) -> f32 {
    let longest = width.max(height);
    if longest == 0 {
        return 1.0;
    }
    (target as f32 / longest as f32).min(max_upscale)
}

/// 読み取り用にリサイズする
pub fn resize_for_decoding(image: &RgbaImage, target: u32, max_upscale: f32) -> Cow<'_, RgbaImage> {
    let scale = decode_scale(image.width(), image.height(), target, max_upscale);
    scale_image(image, scale)
}

/// 長辺が `max_edge` を超える場合だけ縮小する
pub fn fit_within(image: &RgbaImage, max_edge: u32) -> Cow<'_, RgbaImage> {
    let scale = decode_scale(image.width(), image.height(), max_edge, 1.0);
    scale_image(image, scale)
}

fn scale_image(image: &RgbaImage, scale: f32) -> Cow<'_, RgbaImage> {
    if (scale - 1.0).abs() < f32::EPSILON || image.width() == 0 || image.height() == 0 {
        return Cow::Borrowed(image);
    }

    let width = ((image.width() as f32 * scale).round() as u32).max(1);
    let height = ((image.height() as f32 * scale).round() as u32).max(1);
    Cow::Owned(imageops::resize(image, width, height, FilterType::Triangle))
}

/// ITU-R BT.601 輝度
fn luminance(pixel: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = pixel.0;
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

/// 輝度ヒストグラムから暗点・明点を求める
///
/// 累積画素数が初めて各パーセンタイルに達した輝度を返す。幅が無ければNone。
pub fn stretch_points(image: &RgbaImage, low: f32, high: f32) -> Option<(u8, u8)> {
    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return None;
    }

    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[luminance(pixel) as usize] += 1;
    }

    let low_count = total as f64 * low as f64;
    let high_count = total as f64 * high as f64;
    let mut dark = None;
    let mut bright = None;
    let mut cumulative = 0u64;

    for (level, count) in histogram.iter().enumerate() {
        cumulative += count;
        if dark.is_none() && cumulative as f64 >= low_count {
            dark = Some(level as u8);
        }
        if cumulative as f64 >= high_count {
            bright = Some(level as u8);
            break;
        }
    }

    match (dark, bright) {
        (Some(d), Some(b)) if b > d => Some((d, b)),
        _ => None,
    }
}

/// コントラスト伸張 + ガンマ補正
pub fn contrast_stretch(image: &RgbaImage, options: &NormalizerOptions) -> RgbaImage {
    let Some((dark, bright)) = stretch_points(image, options.low_percentile, options.high_percentile) else {
        return image.clone();
    };

    let range = (bright - dark) as f32;
    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let stretched = ((value as f32 - dark as f32) * 255.0 / range).clamp(0.0, 255.0);
        let corrected = 255.0 * (stretched / 255.0).powf(options.gamma);
        *slot = corrected.round().clamp(0.0, 255.0) as u8;
    }

    map_channels(image, |v| lut[v as usize])
}

/// グレースケール化
pub fn grayscale(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let y = luminance(pixel);
        pixel.0 = [y, y, y, pixel.0[3]];
    }
    out
}

/// 階調反転
pub fn invert(image: &RgbaImage) -> RgbaImage {
    map_channels(image, |v| 255 - v)
}

const SHARPEN_KERNEL: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// 線形コントラスト（中間値128中心）の後に3x3カーネルでシャープ化
///
/// 外周1画素はコントラスト調整のみ。
pub fn sharpen(image: &RgbaImage, contrast: f32) -> RgbaImage {
    let adjusted = map_channels(image, |v| {
        ((v as f32 - 128.0) * contrast + 128.0).round().clamp(0.0, 255.0) as u8
    });

    let (width, height) = adjusted.dimensions();
    let mut out = adjusted.clone();
    if width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sums = [0i32; 3];
            for (k, weight) in SHARPEN_KERNEL.iter().enumerate() {
                if *weight == 0 {
                    continue;
                }
                let sx = x + (k as u32 % 3) - 1;
                let sy = y + (k as u32 / 3) - 1;
                let source = adjusted.get_pixel(sx, sy);
                for (c, sum) in sums.iter_mut().enumerate() {
                    *sum += source.0[c] as i32 * weight;
                }
            }
            let pixel = out.get_pixel_mut(x, y);
            for (c, sum) in sums.iter().enumerate() {
                pixel.0[c] = (*sum).clamp(0, 255) as u8;
            }
        }
    }

    out
}

/// RGBチャンネルにだけ変換を適用する（アルファは保持）
fn map_channels<F>(image: &RgbaImage, f: F) -> RgbaImage
where
    F: Fn(u8) -> u8,
{
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = f(*channel);
        }
    }
    out
}
