//! 犬種分類サービス
//!
//! アップロードされた犬の画像を事前学習済みCNNモデルで分類し、
//! 犬種名を返すWebサービスと、モデルアーカイブの構成を示す
//! テンプレート作成ツールを提供します。
//!
//! 分類の数値計算・学習・画像コーデックはすべて外部ライブラリ
//! （Burn / imageクレート）に委譲しており、このクレートは
//! レイヤー構成の定義、重みの読み込み、画像の前処理、
//! 出力インデックスからラベルへの変換といった「つなぎ」だけを担います。

pub mod ml;
pub mod model;
pub mod server;
