//! モデル推論機能

use anyhow::Result;
use burn::{
    backend::ndarray::NdArrayDevice,
    backend::NdArray,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::Tensor,
};
use std::path::Path;

use crate::ml::{prepare_image, BreedClassifier, ModelConfig};
use crate::model::{load_model_with_metadata, LabelSet};

/// 推論に使用するCPUバックエンド
pub type CpuBackend = NdArray<f32>;

/// 推論エンジン
///
/// モデルアーカイブから重みとラベル集合を復元し、画像ファイルを
/// 犬種ラベルに分類します。起動後は読み取り専用で、全リクエストから
/// 安全に共有できます。
pub struct InferenceEngine {
    model: BreedClassifier<CpuBackend>,
    labels: LabelSet,
    input_size: usize,
    device: NdArrayDevice,
}

impl InferenceEngine {
    /// モデルアーカイブを読み込んで推論エンジンを初期化
    ///
    /// 導出したラベル数とモデルの出力次元が一致しない場合はエラーを返します
    /// （不一致のまま起動すると推論時にラベルの取り違えが起きるため）。
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let (metadata, model_binary) = load_model_with_metadata(model_path.as_ref())?;

        // ラベル集合を導出（重複除去・ソート済み）
        let labels = LabelSet::from_raw(&metadata.breed_labels);

        // 起動時の不変条件: ラベル数 == モデル出力次元
        if labels.len() != metadata.num_classes {
            anyhow::bail!(
                "ラベル数とモデル出力次元が一致しません: ラベル{}種 / 出力{}クラス ({})",
                labels.len(),
                metadata.num_classes,
                model_path.as_ref().display()
            );
        }

        let device = NdArrayDevice::default();

        let model_config = ModelConfig::new(metadata.num_classes)
            .with_image_size(metadata.model_input_size as usize)
            .with_dropout(0.0); // 推論時はドロップアウトなし

        let model = model_config.init::<CpuBackend>(&device);

        // モデルの重みを復元
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, &device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;

        let model = model.load_record(record);

        Ok(Self {
            model,
            labels,
            input_size: metadata.model_input_size as usize,
            device,
        })
    }

    /// 単一画像を分類
    ///
    /// デコード -> リサイズ -> [0,1]正規化 -> 推論 -> argmax -> ラベル変換
    pub fn classify_image<P: AsRef<Path>>(&self, image_path: P) -> Result<String> {
        let image_data = prepare_image(image_path.as_ref(), self.input_size)?;

        // Tensorに変換 [1, 3, size, size]
        let size = self.input_size;
        let tensor = Tensor::<CpuBackend, 1>::from_floats(image_data.as_slice(), &self.device)
            .reshape([1, 3, size, size]);

        // 推論実行
        let (predicted, _probabilities) = self.model.predict(tensor);

        let class_idx = predicted
            .into_data()
            .to_vec::<i64>()
            .map_err(|e| anyhow::anyhow!("推論結果の取得エラー: {:?}", e))?[0]
            as usize;

        // クラス名に変換
        let label = self
            .labels
            .get(class_idx)
            .ok_or_else(|| anyhow::anyhow!("クラスインデックス {} は範囲外です", class_idx))?;

        Ok(label.to_string())
    }

    /// ラベル集合への参照を取得
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// モデル入力サイズを取得
    pub fn input_size(&self) -> usize {
        self.input_size
    }
}
