//! 犬種分類の推論Webサービスのエントリポイント
//!
//! 起動時にモデルアーカイブとラベル集合を読み込み、HTTPサーバーを開始します。
//! 起動中のあらゆる失敗（アーカイブ欠落、ラベル数不一致、バインド失敗）は
//! そのままプロセスの致命的エラーになります。

use breed_classifier::ml::InferenceEngine;
use breed_classifier::model::AppConfig;
use breed_classifier::server::{self, ServiceContext};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Breed Classifier Server ===\n");

    let config = AppConfig::load_or_default();
    config.display();

    println!("モデルを読み込み中: {}", config.model_path);
    let engine = InferenceEngine::load(&config.model_path)?;

    println!("クラス数: {}", engine.labels().len());
    println!("モデル入力サイズ: {0}x{0}", engine.input_size());

    let ctx = Arc::new(ServiceContext::new(
        engine,
        PathBuf::from(&config.template_path),
        PathBuf::from(&config.upload_dir),
    ));

    server::run(ctx, &config.bind_addr).await
}
