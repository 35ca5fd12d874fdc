//! アプリケーション設定管理モジュール
//!
//! モデルパスやサーバーのバインドアドレスなどをJSON形式で保存・読み込みします。

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 使用するモデルアーカイブのパス
    pub model_path: String,
    /// HTTPサーバーのバインドアドレス
    pub bind_addr: String,
    /// インデックスページのHTMLテンプレートのパス
    pub template_path: String,
    /// アップロード画像の一時ファイル置き場
    pub upload_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: "models/dog_breeds.tar.gz".to_string(),
            bind_addr: "127.0.0.1:5000".to_string(),
            template_path: "templates/imageres.html".to_string(),
            upload_dir: "uploads".to_string(),
        }
    }
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// デフォルトパスから設定を読み込む、存在しない場合はデフォルト設定を返す
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if path.exists() {
            match Self::load(&path) {
                Ok(config) => {
                    println!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    eprintln!(
                        "警告: 設定ファイルの読み込みに失敗しました ({}): {}",
                        path.display(),
                        e
                    );
                    eprintln!("デフォルト設定を使用します");
                    Self::default()
                }
            }
        } else {
            println!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 設定情報を表示
    pub fn display(&self) {
        println!("=== アプリケーション設定 ===");
        println!("モデルパス: {}", self.model_path);
        println!("バインドアドレス: {}", self.bind_addr);
        println!("テンプレート: {}", self.template_path);
        println!("アップロード置き場: {}", self.upload_dir);
        println!("========================");
    }
}
