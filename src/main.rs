use anyhow::Context;
use clap::Parser;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use part_intake::{cli, config, decoder, error, export, intake, scanner, store};
use part_intake_common::{suggest, EntryPatch, IntakeEntry, MatchStatus};
use cli::{Cli, Commands};
use config::Config;
use decoder::BarcodeDecoder;
use error::{IntakeError, Result};
use intake::{CatalogSnapshot, IntakeContext, IntakeForm};
use std::path::PathBuf;
use std::sync::Arc;
use store::{CatalogSource, JsonCatalogFile, RecordStore};
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("設定ファイルを読み込めません")?;
    run(cli.command, config).await?;
    Ok(())
}

fn open_context(config: &Config) -> IntakeContext<BarcodeDecoder> {
    let catalog = JsonCatalogFile::in_dir(&config.data_dir());
    let snapshot = CatalogSnapshot::load(&catalog);
    if let Some(reason) = snapshot.warning() {
        println!("⚠ カタログを読み込めません（照合は常に該当なし）: {}", reason);
    }
    IntakeContext::new(BarcodeDecoder::new(), &config.pipeline, snapshot)
}

fn prompt_text(prompt: &str) -> Result<String> {
    Input::<String>::new()
        .with_prompt(prompt)
        .interact_text()
        .map_err(|e| IntakeError::Prompt(e.to_string()))
}

fn print_entry(entry: &IntakeEntry) {
    let id = entry.id.to_string();
    println!(
        "  {}  {}  {} x{}  @{}  by {}{}",
        &id[..8],
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.code,
        entry.quantity,
        entry.location,
        entry.submitted_by,
        if entry.manual { "  (手入力)" } else { "" }
    );
    if !entry.description.is_empty() {
        println!("            {}", entry.description);
    }
}

fn status_label(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::Exact => "完全一致",
        MatchStatus::Fuzzy => "あいまい一致",
        MatchStatus::NoMatch => "該当なし",
    }
}

async fn run(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Decode { image } => {
            println!("🔍 part-intake - バーコード読み取り\n");

            let ctx = Arc::new(open_context(&config));
            let outcome = ctx.scan_file(image).await?;
            println!("✔ 読み取り結果: {}", outcome.decode.code);
            println!(
                "  前処理: {} / 設定: {} / 誤差: {:.3} / 試行: {}",
                outcome.decode.variant,
                outcome.decode.config_id,
                outcome.decode.score,
                outcome.decode.attempts
            );
        }

        Commands::Scan { image, quantity, location, reason, user, dry_run } => {
            println!("📦 part-intake - 入庫登録\n");

            let ctx = Arc::new(open_context(&config));

            // 1. 読み取り
            println!("[1/3] バーコードを読み取り中...");
            let outcome = match ctx.scan_file(image).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_decode_failure() => {
                    println!("✖ {}", e);
                    println!("  手入力: part-intake manual <コード> -q <数量> -l <場所>");
                    return Err(e);
                }
                Err(e) => return Err(e),
            };
            println!("✔ {}\n", outcome.decode.code);

            // 2. 照合
            println!("[2/3] カタログ照合中...");
            let entry = ctx.require_entry(&outcome.matched, &outcome.decode.code)?;
            println!(
                "✔ {}: {} {}（距離 {}）\n",
                status_label(outcome.matched.status()),
                entry.code,
                entry.description,
                outcome.matched.distance()
            );

            if dry_run {
                println!("✅ 照合のみ（登録していません）");
                return Ok(());
            }

            // 3. 登録
            println!("[3/3] 入庫記録を保存中...");
            let quantity = match quantity {
                Some(q) => q,
                None => prompt_text("数量")?,
            };
            let location = match location {
                Some(l) => l,
                None => prompt_text("保管場所")?,
            };
            let form = IntakeForm {
                quantity,
                location,
                reason: reason.unwrap_or_default(),
                submitted_by: user.or_else(|| config.user()),
            };
            let store = RecordStore::open(&config.data_dir())?;
            let receipt = ctx.submit(&store, &entry, form, false)?;
            println!("✔ {}（ID: {}）", receipt.message, receipt.id);

            println!("\n✅ 完了");
        }

        Commands::Manual { code, quantity, location, reason, user } => {
            println!("✍ part-intake - 手入力登録\n");

            let ctx = open_context(&config);
            let entry = match ctx.lookup_exact(&code) {
                Ok(entry) => entry,
                Err(e) => {
                    let candidates = suggest(&code, ctx.snapshot().catalog());
                    if !candidates.is_empty() {
                        println!("  候補:");
                        for c in candidates.iter().take(10) {
                            println!("    {}  {}", c.code, c.description);
                        }
                    }
                    return Err(e);
                }
            };

            let form = IntakeForm {
                quantity,
                location,
                reason: reason.unwrap_or_default(),
                submitted_by: user.or_else(|| config.user()),
            };
            let store = RecordStore::open(&config.data_dir())?;
            let receipt = ctx.submit(&store, &entry, form, true)?;
            println!("✔ {}（ID: {}）", receipt.message, receipt.id);
        }

        Commands::Match { code } => {
            let ctx = open_context(&config);
            let result = ctx.match_code(&code);
            println!("{}: {}（距離 {}）", status_label(result.status()), code, result.distance());
            if let Some(entry) = result.entry() {
                println!("  {}  {}  補助品番: {}", entry.code, entry.description, entry.auxiliary_flag);
            }
        }

        Commands::Search { query } => {
            let ctx = open_context(&config);
            let candidates = suggest(&query, ctx.snapshot().catalog());
            if candidates.is_empty() {
                println!("候補がありません");
            }
            for entry in candidates {
                println!("  {}  {}", entry.code, entry.description);
            }
        }

        Commands::Batch { folder, recursive } => {
            println!("🗂 part-intake - 一括読み取り\n");

            println!("[1/2] 画像をスキャン中...");
            let images = scanner::scan_folder(&folder, recursive)?;
            println!("✔ {}枚の画像を検出\n", images.len());
            if images.is_empty() {
                return Ok(());
            }

            println!("[2/2] 読み取り中...");
            let ctx = open_context(&config);
            let pb = ProgressBar::new(images.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {elapsed}") {
                pb.set_style(style);
            }
            let items = decoder::batch::decode_images(ctx.orchestrator(), &images, Some(&pb));
            pb.finish_and_clear();

            let mut decoded = 0;
            for item in &items {
                match &item.result {
                    Ok(outcome) => {
                        decoded += 1;
                        let matched = ctx.match_code(&outcome.code);
                        let description = matched.entry().map(|e| e.description.as_str()).unwrap_or("");
                        println!(
                            "  ✔ {}  {}  [{}] {}",
                            item.image.file_name,
                            outcome.code,
                            status_label(matched.status()),
                            description
                        );
                    }
                    Err(e) => println!("  ✖ {}  {}", item.image.file_name, e),
                }
            }

            println!("\n✅ {}/{}枚を読み取りました", decoded, items.len());
        }

        Commands::List { limit, all } => {
            let store = RecordStore::open(&config.data_dir())?;
            let entries = store.list(if all { None } else { Some(limit) })?;
            if entries.is_empty() {
                println!("入庫記録はありません");
            }
            for entry in &entries {
                print_entry(entry);
            }
        }

        Commands::Edit { id, code, description, aux, quantity, location, reason, user } => {
            let store = RecordStore::open(&config.data_dir())?;
            let id = store.resolve_id(&id)?;

            if location.as_deref().is_some_and(|l| l.trim().is_empty()) {
                return Err(IntakeError::Validation("保管場所は必須です".into()));
            }
            let patch = EntryPatch {
                code,
                description,
                auxiliary_flag: aux,
                quantity,
                location,
                submitted_by: user,
                reason,
            };
            if patch.is_empty() {
                return Err(IntakeError::Validation("変更する項目を指定してください".into()));
            }

            let updated = store.update(id, &patch)?;
            println!("✔ 更新しました");
            print_entry(&updated);
        }

        Commands::Delete { id, yes } => {
            let store = RecordStore::open(&config.data_dir())?;
            let id = store.resolve_id(&id)?;
            let entry = store.get(id)?;
            print_entry(&entry);

            let confirmed = yes
                || Confirm::new()
                    .with_prompt("この記録を削除しますか？")
                    .default(false)
                    .interact()
                    .map_err(|e| IntakeError::Prompt(e.to_string()))?;
            if !confirmed {
                println!("中止しました");
                return Ok(());
            }

            store.delete(id)?;
            println!("✔ 削除しました");
        }

        Commands::Export { format, output } => {
            println!("📄 part-intake - エクスポート\n");

            let store = RecordStore::open(&config.data_dir())?;
            let entries = store.load()?;
            let output = output.unwrap_or_else(|| PathBuf::from("."));
            for path in export::export_entries(&entries, &format, &output)? {
                println!("✔ {}", path.display());
            }

            println!("\n✅ エクスポート完了（{}件）", entries.len());
        }

        Commands::Catalog { import, show } => {
            let source = JsonCatalogFile::in_dir(&config.data_dir());

            if let Some(path) = import {
                let catalog = store::catalog::import_catalog(&path)?;
                source.save(&catalog)?;
                println!("✔ {}件を取り込みました: {}", catalog.len(), source.path().display());
            }

            if show {
                let catalog = source.load()?;
                println!("カタログ（{}件）:", catalog.len());
                for entry in catalog.entries() {
                    println!("  {}  {}  補助品番: {}", entry.code, entry.description, entry.auxiliary_flag);
                }
            }
        }

        Commands::Config { set_user, set_data_dir, set_tolerance, set_threshold, show } => {
            let mut config = config;
            let changed = set_user.is_some()
                || set_data_dir.is_some()
                || set_tolerance.is_some()
                || set_threshold.is_some();

            if let Some(user) = set_user {
                config.default_user = Some(user);
            }
            if let Some(dir) = set_data_dir {
                config.data_dir = dir;
            }
            if let Some(tolerance) = set_tolerance {
                config.pipeline.match_tolerance = tolerance;
            }
            if let Some(threshold) = set_threshold {
                config.pipeline.accept_threshold = threshold;
            }
            if changed {
                config.save()?;
                println!("✔ 設定を保存しました");
            }

            if show {
                println!("設定:");
                println!("  データ: {}", config.data_dir().display());
                println!("  登録者: {}", config.user().unwrap_or_else(|| "未設定".into()));
                println!("  許容距離: {}", config.pipeline.match_tolerance);
                println!("  採用閾値: {}", config.pipeline.accept_threshold);
                println!("  長辺: {}px（拡大上限 x{}）", config.pipeline.target_size, config.pipeline.max_upscale);
            }
        }
    }

    Ok(())
}
