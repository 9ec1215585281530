//! カタログ照合モジュール
//!
//! 読み取った生コードを部品カタログと照合する。
//!
//! ## 処理フロー
//! 1. 完全一致（大文字小文字を区別）
//! 2. レーベンシュタイン距離による最近傍（小文字化して比較）
//! 3. 許容距離以内なら FUZZY、超えたら NONE

use crate::types::{Catalog, CatalogEntry, MatchResult};

/// 照合オプション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// あいまい一致として受け入れる最大距離
    pub tolerance: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { tolerance: 2 }
    }
}

/// 生コードをカタログと照合する
///
/// 照合は失敗しない。見つからない場合は `NONE` の結果を返す。
pub fn match_code(raw_code: &str, catalog: &Catalog, options: &MatchOptions) -> MatchResult {
    if let Some(entry) = catalog.get(raw_code) {
        return MatchResult::exact(entry.clone());
    }

    let Some((entry, distance)) = nearest_entry(raw_code, catalog.entries()) else {
        return MatchResult::none(0);
    };

    if distance <= options.tolerance {
        MatchResult::fuzzy(entry.clone(), distance)
    } else {
        MatchResult::none(distance)
    }
}

/// 最小距離のエントリを返す（同距離なら先に現れた方）
fn nearest_entry<'a>(
    raw_code: &str,
    entries: &'a [CatalogEntry],
) -> Option<(&'a CatalogEntry, usize)> {
    let query = raw_code.to_lowercase();
    let mut best: Option<(&CatalogEntry, usize)> = None;

    for entry in entries {
        let distance = levenshtein_distance(&query, &entry.code.to_lowercase());
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((entry, distance)),
        }
    }

    best
}

/// 手入力時の候補を返す
///
/// - 空白を含む入力: 先頭トークンに最も近い1件
/// - それ以外: コードに入力文字列を含む全件（カタログ順）
pub fn suggest<'a>(query: &str, catalog: &'a Catalog) -> Vec<&'a CatalogEntry> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    if query.contains(char::is_whitespace) {
        let first = query.split_whitespace().next().unwrap_or_default();
        return nearest_entry(first, catalog.entries())
            .map(|(entry, _)| vec![entry])
            .unwrap_or_default();
    }

    catalog
        .entries()
        .iter()
        .filter(|e| e.code.to_lowercase().contains(&query))
        .collect()
}

/// レーベンシュタイン距離を計算
///
/// 挿入・削除・置換のコストはいずれも1。文字単位（バイトではない）で比較する。
/// 直前の行だけを持ち回すので、メモリは短い方の文字数に比例する。
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let (long, short) = if a.chars().count() >= b.chars().count() { (a, b) } else { (b, a) };
    let short: Vec<char> = short.chars().collect();

    let mut previous: Vec<usize> = (0..=short.len()).collect();
    let mut current = vec![0; short.len() + 1];

    for (i, lc) in long.chars().enumerate() {
        current[0] = i + 1;
        for (j, &sc) in short.iter().enumerate() {
            let substitution = previous[j] + usize::from(lc != sc);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[short.len()]
}
