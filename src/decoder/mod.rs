//! バーコード読み取りモジュール
//!
//! 前処理バリアントとデコーダ設定の組み合わせ（ストラテジ）を、速く当たりやすい順に試す。
//! 平均誤差が閾値未満の結果が出た時点で打ち切る。全滅なら `DecodeFailure`。
//! 誤差が大きい候補はログに残すだけで返さない。

pub mod barcode;
pub mod batch;
pub mod session;

pub use barcode::BarcodeDecoder;
pub use session::{DecodeSession, DecodeTicket};

use crate::config::PipelineConfig;
use crate::error::{IntakeError, Result};
use crate::imaging::{self, NormalizerOptions, Variant};
use image::{DynamicImage, RgbaImage};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// 対応シンボル形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolFormat {
    Code128,
    Code39,
    Code93,
    Ean13,
    Ean8,
    UpcA,
    Qr,
}

impl SymbolFormat {
    pub const LINEAR: [SymbolFormat; 6] = [
        SymbolFormat::Code128,
        SymbolFormat::Code39,
        SymbolFormat::Code93,
        SymbolFormat::Ean13,
        SymbolFormat::Ean8,
        SymbolFormat::UpcA,
    ];

    pub const ALL: [SymbolFormat; 7] = [
        SymbolFormat::Code128,
        SymbolFormat::Code39,
        SymbolFormat::Code93,
        SymbolFormat::Ean13,
        SymbolFormat::Ean8,
        SymbolFormat::UpcA,
        SymbolFormat::Qr,
    ];
}

/// ロケータの探索パッチサイズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSize {
    Small,
    Medium,
    Large,
    XLarge,
}

/// デコーダ設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    pub id: &'static str,
    pub formats: Vec<SymbolFormat>,
    /// デコーダに渡す画像の長辺上限
    pub input_size: u32,
    pub patch_size: PatchSize,
    pub half_sample: bool,
}

impl DecoderConfig {
    pub fn accepts(&self, format: SymbolFormat) -> bool {
        self.formats.contains(&format)
    }
}

/// デコーダの生の出力
#[derive(Debug, Clone, PartialEq)]
pub struct RawDecode {
    pub text: String,
    /// 要素（文字）ごとの誤差
    pub element_errors: Vec<f32>,
}

impl RawDecode {
    pub fn new(text: impl Into<String>, element_errors: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            element_errors,
        }
    }

    /// 誤り訂正などでデコーダ側が検証済みの結果（誤差0扱い）
    pub fn validated(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    /// 平均誤差（要素誤差が無ければ0）
    pub fn mean_error(&self) -> f32 {
        if self.element_errors.is_empty() {
            return 0.0;
        }
        self.element_errors.iter().sum::<f32>() / self.element_errors.len() as f32
    }
}

/// 外部シンボルデコーダの境界
///
/// 読めなければ `Ok(None)`。`Err` は1回の試行の失敗として扱われ、次のストラテジへ進む。
pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, image: &RgbaImage, config: &DecoderConfig) -> Result<Option<RawDecode>>;
}

impl<T: SymbolDecoder + ?Sized> SymbolDecoder for Box<T> {
    fn decode(&self, image: &RgbaImage, config: &DecoderConfig) -> Result<Option<RawDecode>> {
        (**self).decode(image, config)
    }
}

/// バリアント × デコーダ設定
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub variant: Variant,
    pub config: DecoderConfig,
}

impl Strategy {
    pub fn new(variant: Variant, config: DecoderConfig) -> Self {
        Self { variant, config }
    }
}

/// 既定のストラテジ順（特定形式・高解像度 → 全形式・低解像度）
pub fn default_strategies() -> Vec<Strategy> {
    use SymbolFormat::*;

    vec![
        Strategy::new(Variant::Original, DecoderConfig {
            id: "code128-full",
            formats: vec![Code128],
            input_size: 1920,
            patch_size: PatchSize::Medium,
            half_sample: false,
        }),
        Strategy::new(Variant::ContrastStretch, DecoderConfig {
            id: "code128-full",
            formats: vec![Code128],
            input_size: 1920,
            patch_size: PatchSize::Medium,
            half_sample: false,
        }),
        Strategy::new(Variant::Grayscale, DecoderConfig {
            id: "code128-39",
            formats: vec![Code128, Code39],
            input_size: 1600,
            patch_size: PatchSize::Large,
            half_sample: false,
        }),
        Strategy::new(Variant::Sharpened, DecoderConfig {
            id: "linear-1200",
            formats: SymbolFormat::LINEAR.to_vec(),
            input_size: 1200,
            patch_size: PatchSize::Large,
            half_sample: false,
        }),
        Strategy::new(Variant::Inverted, DecoderConfig {
            id: "linear-1200",
            formats: SymbolFormat::LINEAR.to_vec(),
            input_size: 1200,
            patch_size: PatchSize::Large,
            half_sample: false,
        }),
        Strategy::new(Variant::ContrastStretch, DecoderConfig {
            id: "sweep-800",
            formats: SymbolFormat::ALL.to_vec(),
            input_size: 800,
            patch_size: PatchSize::XLarge,
            half_sample: true,
        }),
        Strategy::new(Variant::Rotated90, DecoderConfig {
            id: "sweep-rotated",
            formats: SymbolFormat::ALL.to_vec(),
            input_size: 1200,
            patch_size: PatchSize::Large,
            half_sample: false,
        }),
    ]
}

/// 1回の試行（呼び出しの外には出ない）
#[derive(Debug, Clone)]
struct DecodeAttempt {
    variant: Variant,
    config_id: &'static str,
    raw_text: String,
    code: String,
    score: f32,
}

/// 採用された読み取り結果
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    pub code: String,
    pub variant: Variant,
    pub config_id: &'static str,
    pub score: f32,
    /// 採用までに試したストラテジ数
    pub attempts: usize,
}

const DELIMITER_CHARS: [char; 3] = ['#', '*', '-'];

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c.is_control() || DELIMITER_CHARS.contains(&c)
}

/// 候補文字列を整形する
///
/// 文字列全体の前後から空白と区切り記号（`#` `*` `-`）を除き、最初の空白区切りトークンを
/// そのまま残す（トークン末尾の記号は削らない）。何も残らなければNone。
pub fn clean_candidate(raw: &str) -> Option<String> {
    raw.trim_matches(is_delimiter)
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// 読み取りオーケストレータ
pub struct DecodeOrchestrator<D> {
    decoder: D,
    strategies: Vec<Strategy>,
    accept_threshold: f32,
    normalizer: NormalizerOptions,
}

impl<D: SymbolDecoder> DecodeOrchestrator<D> {
    pub fn new(decoder: D, config: &PipelineConfig) -> Self {
        Self {
            decoder,
            strategies: default_strategies(),
            accept_threshold: config.accept_threshold,
            normalizer: NormalizerOptions::from(config),
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn accept_threshold(&self) -> f32 {
        self.accept_threshold
    }

    /// 画像からパーツコードを読み取る
    pub fn decode(&self, image: &DynamicImage) -> Result<String> {
        self.decode_detailed(image).map(|outcome| outcome.code)
    }

    /// 採用したストラテジとスコア付きで読み取る
    pub fn decode_detailed(&self, image: &DynamicImage) -> Result<DecodeOutcome> {
        let source = image.to_rgba8();
        // バリアントはこの呼び出しの間だけ使い回す
        let mut rendered: HashMap<Variant, RgbaImage> = HashMap::new();
        let mut fallback: Option<DecodeAttempt> = None;

        for (index, strategy) in self.strategies.iter().enumerate() {
            let variant_image = rendered
                .entry(strategy.variant)
                .or_insert_with(|| imaging::render(&source, strategy.variant, &self.normalizer));
            let input = imaging::fit_within(variant_image, strategy.config.input_size);

            let raw = match self.decoder.decode(&input, &strategy.config) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    debug!(variant = %strategy.variant, config = strategy.config.id, "no symbol found");
                    continue;
                }
                Err(e) => {
                    warn!(variant = %strategy.variant, config = strategy.config.id, error = %e, "decode attempt failed");
                    continue;
                }
            };

            let Some(code) = clean_candidate(&raw.text) else {
                debug!(variant = %strategy.variant, config = strategy.config.id, "empty candidate");
                continue;
            };

            let attempt = DecodeAttempt {
                variant: strategy.variant,
                config_id: strategy.config.id,
                score: raw.mean_error(),
                raw_text: raw.text,
                code,
            };

            if attempt.score < self.accept_threshold {
                info!(
                    code = %attempt.code,
                    variant = %attempt.variant,
                    config = attempt.config_id,
                    score = attempt.score,
                    "barcode accepted"
                );
                return Ok(DecodeOutcome {
                    code: attempt.code,
                    variant: attempt.variant,
                    config_id: attempt.config_id,
                    score: attempt.score,
                    attempts: index + 1,
                });
            }

            debug!(
                code = %attempt.code,
                raw = %attempt.raw_text,
                variant = %attempt.variant,
                config = attempt.config_id,
                score = attempt.score,
                "candidate above threshold"
            );
            if fallback.as_ref().map_or(true, |best| attempt.score < best.score) {
                fallback = Some(attempt);
            }
        }

        if let Some(best) = fallback {
            info!(
                code = %best.code,
                variant = %best.variant,
                config = best.config_id,
                score = best.score,
                "discarding low-confidence candidate"
            );
        }

        Err(IntakeError::DecodeFailure {
            attempts: self.strategies.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 台本どおりに応答するデコーダ
    pub(crate) struct ScriptedDecoder {
        responses: Mutex<VecDeque<Result<Option<RawDecode>>>>,
        calls: Mutex<Vec<(&'static str, u32)>>,
    }

    impl ScriptedDecoder {
        pub(crate) fn new(responses: Vec<Result<Option<RawDecode>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn calls(&self) -> Vec<(&'static str, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SymbolDecoder for ScriptedDecoder {
        fn decode(&self, image: &RgbaImage, config: &DecoderConfig) -> Result<Option<RawDecode>> {
            self.calls
                .lock()
                .unwrap()
                .push((config.id, image.width().max(image.height())));
            self.responses.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    pub(crate) fn sample_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 32, |x, _| {
            if x % 4 < 2 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        }))
    }

    fn orchestrator(responses: Vec<Result<Option<RawDecode>>>) -> DecodeOrchestrator<ScriptedDecoder> {
        DecodeOrchestrator::new(ScriptedDecoder::new(responses), &PipelineConfig::default())
    }

    #[test]
    fn test_stops_at_first_accepted_result() {
        let orch = orchestrator(vec![
            Ok(None),
            Ok(None),
            Ok(Some(RawDecode::new("X1 extra", vec![0.05]))),
            Ok(Some(RawDecode::new("SHOULD-NOT-BE-READ", vec![0.0]))),
        ]);

        let code = orch.decode(&sample_image()).unwrap();
        assert_eq!(code, "X1");
        assert_eq!(orch.decoder().call_count(), 3);
    }

    #[test]
    fn test_decode_detailed_reports_strategy() {
        let orch = orchestrator(vec![
            Ok(None),
            Ok(Some(RawDecode::new("*ABC123*", vec![0.02, 0.04]))),
        ]);

        let outcome = orch.decode_detailed(&sample_image()).unwrap();
        assert_eq!(outcome.code, "ABC123");
        assert_eq!(outcome.variant, Variant::ContrastStretch);
        assert_eq!(outcome.config_id, "code128-full");
        assert_eq!(outcome.attempts, 2);
        assert!((outcome.score - 0.03).abs() < 1e-6);
    }

    #[test]
    fn test_all_empty_fails() {
        let orch = orchestrator(vec![]);
        let result = orch.decode(&sample_image());
        assert!(matches!(result, Err(IntakeError::DecodeFailure { attempts: 7 })));
        assert_eq!(orch.decoder().call_count(), 7);
    }

    #[test]
    fn test_low_confidence_results_are_not_returned() {
        let responses = (0..7)
            .map(|_| Ok(Some(RawDecode::new("ABC123", vec![0.4, 0.2]))))
            .collect();
        let orch = orchestrator(responses);
        let result = orch.decode(&sample_image());
        assert!(matches!(result, Err(IntakeError::DecodeFailure { .. })));
    }

    #[test]
    fn test_decoder_errors_are_swallowed() {
        let orch = orchestrator(vec![
            Err(IntakeError::ImageLoad("decoder crashed".into())),
            Ok(Some(RawDecode::validated("P-100"))),
        ]);
        assert_eq!(orch.decode(&sample_image()).unwrap(), "P-100");
    }

    #[test]
    fn test_whitespace_only_candidate_is_skipped() {
        let orch = orchestrator(vec![
            Ok(Some(RawDecode::new("  ** ", vec![0.0]))),
            Ok(Some(RawDecode::new("Q7", vec![0.1]))),
        ]);
        assert_eq!(orch.decode(&sample_image()).unwrap(), "Q7");
        assert_eq!(orch.decoder().call_count(), 2);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let config = PipelineConfig {
            accept_threshold: 0.5,
            ..Default::default()
        };
        let decoder = ScriptedDecoder::new(vec![Ok(Some(RawDecode::new("LOOSE", vec![0.3])))]);
        let orch = DecodeOrchestrator::new(decoder, &config);
        assert_eq!(orch.decode(&sample_image()).unwrap(), "LOOSE");
    }

    #[test]
    fn test_input_size_is_applied_per_config() {
        let orch = orchestrator(vec![]);
        let large = DynamicImage::ImageRgba8(RgbaImage::new(3000, 1000));
        let _ = orch.decode(&large);

        let calls = orch.decoder().calls();
        assert_eq!(calls[0], ("code128-full", 1920));
        assert_eq!(calls[2], ("code128-39", 1600));
        assert_eq!(calls[3], ("linear-1200", 1200));
        assert_eq!(calls[5], ("sweep-800", 800));
    }

    #[test]
    fn test_empty_strategy_list_fails_immediately() {
        let orch = orchestrator(vec![Ok(Some(RawDecode::validated("X")))]).with_strategies(Vec::new());
        assert!(matches!(
            orch.decode(&sample_image()),
            Err(IntakeError::DecodeFailure { attempts: 0 })
        ));
        assert_eq!(orch.decoder().call_count(), 0);
    }

    #[test]
    fn test_clean_candidate() {
        assert_eq!(clean_candidate("X1 extra").as_deref(), Some("X1"));
        assert_eq!(clean_candidate("  *ABC-123*  ").as_deref(), Some("ABC-123"));
        assert_eq!(clean_candidate("#P100\tqty 4").as_deref(), Some("P100"));
        assert_eq!(clean_candidate("--X9-- lot7").as_deref(), Some("X9--"));
        assert_eq!(clean_candidate("PN-7781- lot42").as_deref(), Some("PN-7781-"));
        assert_eq!(clean_candidate("*PN-7781-*").as_deref(), Some("PN-7781"));
        assert_eq!(clean_candidate(" \r\n").as_deref(), None);
        assert_eq!(clean_candidate("***").as_deref(), None);
    }

    #[test]
    fn test_mean_error() {
        assert_eq!(RawDecode::validated("A").mean_error(), 0.0);
        assert!((RawDecode::new("A", vec![0.1, 0.3]).mean_error() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_default_strategy_order() {
        let strategies = default_strategies();
        assert_eq!(strategies.len(), 7);
        assert_eq!(strategies[0].variant, Variant::Original);
        assert_eq!(strategies[0].config.formats, vec![SymbolFormat::Code128]);
        assert!(strategies.last().unwrap().config.accepts(SymbolFormat::Qr));
    }
}
