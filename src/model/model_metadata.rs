//! モデルメタデータの定義と永続化
//!
//! tar.gz形式のモデルアーカイブに含まれるメタデータ（JSON形式）を定義します。
//! 推論に必要な情報（ラベル配列、クラス数、入力解像度）はすべてここに
//! 集約され、サービスはアーカイブ1ファイルだけで起動できます。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// 学習サンプルごとの生の犬種ラベル（重複あり）
    /// 推論時に重複除去・ソートしてクラスインデックスとの対応を導出する
    pub breed_labels: Vec<String>,

    /// 分類クラス数（モデル出力層の次元数）
    /// 一意なラベル数と一致していなければならない（起動時に検証される）
    pub num_classes: usize,

    /// モデル入力サイズ（CNNへの入力解像度、正方形）
    pub model_input_size: u32,

    /// モデルの作成時刻（ISO8601形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(breed_labels: Vec<String>, num_classes: usize, model_input_size: u32) -> Self {
        let trained_at = chrono::Local::now().to_rfc3339();

        Self {
            breed_labels,
            num_classes,
            model_input_size,
            trained_at,
        }
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}
