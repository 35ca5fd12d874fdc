//! 犬種分類モデルのテンプレート作成ツール
//!
//! 期待されるモデルアーカイブの構成を示すサンプルCNN（224x224入力、120クラス）を
//! 構築し、`--save`指定時に未学習の重みと共にアーカイブへ書き出します。
//!
//! 推論サービス（331x331入力、クラス数はメタデータ依存）とは接続されていない、
//! アーキテクチャ説明用のアーティファクトです。

use breed_classifier::ml::{
    conv_output_size, export_model, CpuBackend, ModelConfig, TEMPLATE_IMAGE_SIZE,
    TEMPLATE_NUM_CLASSES,
};
use breed_classifier::model::{print_metadata_info, ModelMetadata};
use burn::backend::ndarray::NdArrayDevice;
use burn::module::Module;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    println!("{}", "=".repeat(60));
    println!("犬種分類モデル テンプレート");
    println!("{}", "=".repeat(60));
    println!();
    println!("実際に提供可能なモデルアーカイブを作成するには:");
    println!("1. ラベル付きの犬画像データセットを用意する");
    println!("2. 外部の学習パイプラインでモデルを学習する");
    println!("3. 学習済みの重みと犬種ラベル配列をtar.gzアーカイブに保存する");
    println!();

    let config = ModelConfig::template();
    print_summary(&config);

    let save = std::env::args().any(|arg| arg == "--save");
    if save {
        let output_path = PathBuf::from("pet_breed_classifier.tar.gz");
        save_template(&config, &output_path)?;
        println!("\nテンプレートモデルを保存しました: {}", output_path.display());
        println!("注意: このモデルの重みはランダムです。実際の予測には学習が必要です。");
    } else {
        println!("\nテンプレートを保存するには --save を指定してください。");
    }

    Ok(())
}

/// レイヤーごとのサイズとパラメータ数を表示
fn print_summary(config: &ModelConfig) {
    let size = config.image_size;
    let after_conv1 = size - 2;
    let after_pool1 = after_conv1 / 2;
    let after_conv2 = after_pool1 - 2;
    let after_pool2 = after_conv2 / 2;
    let after_conv3 = after_pool2 - 2;
    let after_pool3 = after_conv3 / 2;
    let d = 128 * after_pool3 * after_pool3;

    println!("--- モデル構成 ---");
    println!("入力: {0}x{0}x3", size);
    println!("Conv1 (3->32, 3x3) + ReLU: {0}x{0}", after_conv1);
    println!("MaxPool1 (2x2): {0}x{0}", after_pool1);
    println!("Conv2 (32->64, 3x3) + ReLU: {0}x{0}", after_conv2);
    println!("MaxPool2 (2x2): {0}x{0}", after_pool2);
    println!("Conv3 (64->128, 3x3) + ReLU: {0}x{0}", after_conv3);
    println!("MaxPool3 (2x2): {0}x{0}", after_pool3);
    println!("Flatten: {}", d);
    println!("Dense: {} -> {}", d, config.dense_units);
    println!("Dropout: {}", config.dropout);
    println!(
        "Dense: {} -> {} + Softmax",
        config.dense_units, config.num_classes
    );

    debug_assert_eq!(after_pool3, conv_output_size(size));
}

/// 未学習のテンプレートモデルをアーカイブへ書き出す
fn save_template(config: &ModelConfig, output_path: &PathBuf) -> anyhow::Result<()> {
    let device = NdArrayDevice::default();

    println!("\nテンプレートモデルを初期化中...");
    let model = config.init::<CpuBackend>(&device);

    let total_params = model.num_params();
    println!(
        "総パラメータ数: {} ({:.2}M)",
        total_params,
        total_params as f64 / 1_000_000.0
    );

    // テンプレートには学習サンプルが存在しないため、ラベル配列は空のまま。
    // 提供可能なアーカイブでは学習データ由来の生ラベル配列が入る。
    let metadata = ModelMetadata::new(
        Vec::new(),
        TEMPLATE_NUM_CLASSES,
        TEMPLATE_IMAGE_SIZE as u32,
    );
    print_metadata_info(&metadata);

    export_model(model, &metadata, output_path)
}
