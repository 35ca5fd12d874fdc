//! 犬種分類モデルの共通定義
//!
//! 犬種分類用のCNNモデルと、画像の前処理・モデルアーカイブの書き出しを提供します。

use anyhow::{Context, Result};
use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
};
use std::path::Path;

use crate::model::{save_model_with_metadata, ModelMetadata};

/// 推論サービスのモデル入力サイズ（正方形）
pub const SERVING_IMAGE_SIZE: usize = 331;

/// テンプレートモデルの入力サイズ（正方形）
///
/// 推論サービスの入力サイズ（331）とは意図的に一致していません。
/// テンプレートはアーキテクチャの説明用であり、サービスには接続されません。
pub const TEMPLATE_IMAGE_SIZE: usize = 224;

/// テンプレートモデルの分類クラス数（犬種120種）
pub const TEMPLATE_NUM_CLASSES: usize = 120;

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    pub num_classes: usize,
    /// ドロップアウト率
    #[config(default = 0.5)]
    pub dropout: f64,
    /// 入力画像サイズ（正方形）
    #[config(default = 331)]
    pub image_size: usize,
    /// 全結合層のユニット数
    #[config(default = 512)]
    pub dense_units: usize,
}

/// 3段のConv(3x3, padding無し) + MaxPool(2x2)通過後の特徴マップサイズを計算
///
/// - Conv 3x3 (padding無し): size -> size - 2
/// - Pool 2x2: size -> size / 2 (切り捨て)
pub fn conv_output_size(image_size: usize) -> usize {
    let mut size = image_size;
    for _ in 0..3 {
        size = size.saturating_sub(2) / 2;
    }
    size
}

impl ModelConfig {
    /// テンプレートモデルの設定（224x224入力、120クラス）
    pub fn template() -> Self {
        Self::new(TEMPLATE_NUM_CLASSES).with_image_size(TEMPLATE_IMAGE_SIZE)
    }

    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> BreedClassifier<B> {
        let feature_map_size = conv_output_size(self.image_size);

        if feature_map_size == 0 {
            panic!(
                "入力サイズが小さすぎます: {} (最小22x22が必要)",
                self.image_size
            );
        }

        // 特徴次元 d = 128チャネル * feature_map_size * feature_map_size
        let d = 128 * feature_map_size * feature_map_size;

        BreedClassifier {
            conv1: Conv2dConfig::new([3, 32], [3, 3])
                .with_stride([1, 1])
                .init(device),
            pool1: MaxPool2dConfig::new([2, 2]).init(),

            conv2: Conv2dConfig::new([32, 64], [3, 3])
                .with_stride([1, 1])
                .init(device),
            pool2: MaxPool2dConfig::new([2, 2]).init(),

            conv3: Conv2dConfig::new([64, 128], [3, 3])
                .with_stride([1, 1])
                .init(device),
            pool3: MaxPool2dConfig::new([2, 2]).init(),

            fc1: LinearConfig::new(d, self.dense_units).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(self.dense_units, self.num_classes).init(device),

            activation: Relu::new(),
        }
    }
}

/// 犬種分類用CNNモデル
///
/// 正方形のRGB画像を犬種クラスに分類します。
///
/// # アーキテクチャ
/// - {Conv 3x3 (padding無し) + ReLU + MaxPool 2x2} x 3層
/// - Flatten
/// - FC: d -> dense_units + ReLU
/// - Dropout
/// - FC: dense_units -> num_classes
/// - Softmax (予測時)
#[derive(Module, Debug)]
pub struct BreedClassifier<B: Backend> {
    conv1: Conv2d<B>, // 3 -> 32
    pool1: MaxPool2d, // 2x2
    conv2: Conv2d<B>, // 32 -> 64
    pool2: MaxPool2d, // 2x2
    conv3: Conv2d<B>, // 64 -> 128
    pool3: MaxPool2d, // 2x2

    fc1: Linear<B>, // d -> dense_units
    dropout: Dropout,
    fc2: Linear<B>, // dense_units -> num_classes

    activation: Relu,
}

impl<B: Backend> BreedClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, 3, size, size]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool3.forward(x);

        // Flatten
        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        let x = self.dropout.forward(x);

        self.fc2.forward(x)
    }

    /// クラス確率を計算（Softmax適用）
    ///
    /// # 戻り値
    /// - クラスごとの確率 [batch_size, num_classes]（各行の和は1）
    pub fn forward_probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    /// 予測を実行
    ///
    /// # 戻り値
    /// - (予測クラスID [batch_size, 1], クラス確率 [batch_size, num_classes])
    pub fn predict(&self, images: Tensor<B, 4>) -> (Tensor<B, 2, Int>, Tensor<B, 2>) {
        let probabilities = self.forward_probabilities(images);
        let predictions = probabilities.clone().argmax(1);
        (predictions, probabilities)
    }
}

/// 画像を読み込んで前処理
///
/// デコード -> input_sizeへのリサイズ -> [0,1]へのスケーリングを行い、
/// (C, H, W) の順で平坦化したピクセル値を返します。
///
/// # 引数
/// - `path`: 画像ファイルのパス
/// - `input_size`: モデル入力サイズ（正方形）
pub fn prepare_image(path: &Path, input_size: usize) -> Result<Vec<f32>> {
    let img = image::open(path)
        .context(format!("Failed to decode image: {:?}", path))?
        .to_rgb8();

    let resized = image::imageops::resize(
        &img,
        input_size as u32,
        input_size as u32,
        image::imageops::FilterType::Triangle,
    );

    let mut data = Vec::with_capacity(3 * input_size * input_size);

    for channel in 0..3 {
        for y in 0..input_size as u32 {
            for x in 0..input_size as u32 {
                let pixel = resized.get_pixel(x, y);
                data.push(pixel[channel] as f32 / 255.0);
            }
        }
    }

    Ok(data)
}

/// モデルをメタデータと共にアーカイブへ書き出す
///
/// 重みをバイナリレコーダー（f32精度）で記録し、tar.gzアーカイブとして保存します。
pub fn export_model<B: Backend>(
    model: BreedClassifier<B>,
    metadata: &ModelMetadata,
    output_path: &Path,
) -> Result<()> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    let model_binary = recorder
        .record(model.into_record(), ())
        .map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))?;

    save_model_with_metadata(output_path, metadata, &model_binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_conv_output_size() {
        // テンプレート入力: 224 -> 222/2=111 -> 109/2=54 -> 52/2=26
        assert_eq!(conv_output_size(TEMPLATE_IMAGE_SIZE), 26);
        // サービス入力: 331 -> 329/2=164 -> 162/2=81 -> 79/2=39
        assert_eq!(conv_output_size(SERVING_IMAGE_SIZE), 39);
        // テスト用の小型入力
        assert_eq!(conv_output_size(48), 4);
        // 小さすぎる入力は特徴マップが消滅する
        assert_eq!(conv_output_size(8), 0);
    }

    #[test]
    fn test_template_config() {
        let config = ModelConfig::template();
        assert_eq!(config.num_classes, TEMPLATE_NUM_CLASSES);
        assert_eq!(config.image_size, TEMPLATE_IMAGE_SIZE);
        assert_eq!(config.dense_units, 512);
        assert_eq!(config.dropout, 0.5);
    }

    #[test]
    fn test_forward_output_shape() {
        let device = NdArrayDevice::default();
        let model = ModelConfig::new(3).with_image_size(48).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 48, 48], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 3]);
    }

    #[test]
    fn test_softmax_probabilities_sum_to_one() {
        let device = NdArrayDevice::default();
        let model = ModelConfig::new(5).with_image_size(48).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 48, 48], &device);
        let probabilities = model.forward_probabilities(input);

        assert_eq!(probabilities.dims(), [1, 5]);

        let values = probabilities.into_data().to_vec::<f32>().unwrap();
        let sum: f32 = values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4, "確率の和が1ではない: {}", sum);
        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_template_model_forward() {
        let device = NdArrayDevice::default();
        let model = ModelConfig::template().init::<TestBackend>(&device);

        // 文書化された入力形状 (1, 3, 224, 224) を受け付け、
        // 120クラス分の確率分布（和が1）を出力する
        let input = Tensor::<TestBackend, 4>::ones([1, 3, TEMPLATE_IMAGE_SIZE, TEMPLATE_IMAGE_SIZE], &device);
        let probabilities = model.forward_probabilities(input);

        assert_eq!(probabilities.dims(), [1, TEMPLATE_NUM_CLASSES]);

        let sum: f32 = probabilities.into_data().to_vec::<f32>().unwrap().iter().sum();
        assert!((sum - 1.0).abs() < 1e-3, "確率の和が1ではない: {}", sum);
    }

    #[test]
    fn test_predict_returns_argmax() {
        let device = NdArrayDevice::default();
        let model = ModelConfig::new(4).with_image_size(48).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 48, 48], &device);
        let (predictions, probabilities) = model.predict(input);

        let class_idx = predictions.into_data().to_vec::<i64>().unwrap()[0] as usize;
        let values = probabilities.into_data().to_vec::<f32>().unwrap();

        let max = values.iter().cloned().fold(f32::MIN, f32::max);
        assert_eq!(values[class_idx], max);
    }

    #[test]
    fn test_prepare_image_range_and_length() {
        let path = std::env::temp_dir().join(format!(
            "breed_classifier_prepare_{}.png",
            rand::random::<u32>()
        ));

        // 非正方形・別サイズの画像もリサイズで吸収される
        let img = image::RgbImage::from_fn(64, 40, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 6) as u8, 128])
        });
        img.save(&path).unwrap();

        let data = prepare_image(&path, 48).unwrap();
        assert_eq!(data.len(), 3 * 48 * 48);
        assert!(data.iter().all(|&v| (0.0..=1.0).contains(&v)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_prepare_image_missing_file() {
        let path = std::env::temp_dir().join("breed_classifier_no_such_image.png");
        assert!(prepare_image(&path, 48).is_err());
    }
}
