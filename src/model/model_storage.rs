//! モデルアーカイブの永続化
//!
//! Tar.gz形式でモデルとメタデータを1ファイルに統合して保存・読み込みします。
//!
//! ファイル構成（tar.gz内部）:
//! - metadata.json   - メタデータ（ラベル配列、クラス数、入力解像度）
//! - model.bin       - モデルの重み（バイナリ）

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

use crate::model::model_metadata::ModelMetadata;

/// アーカイブ内のメタデータエントリ名
const METADATA_ENTRY: &str = "metadata.json";
/// アーカイブ内のモデルバイナリエントリ名
const MODEL_ENTRY: &str = "model.bin";

/// 出力パスを.tar.gz拡張子に正規化
fn archive_path(output_path: &Path) -> PathBuf {
    if output_path.extension().and_then(|s| s.to_str()) == Some("gz") {
        output_path.to_path_buf()
    } else {
        output_path.with_extension("tar.gz")
    }
}

/// メタデータと共にモデルをTar.gz形式で保存
///
/// 1つのtar.gzファイルに以下を含む：
/// - metadata.json : メタデータ
/// - model.bin : モデルの重み
pub fn save_model_with_metadata(
    output_path: &Path,
    metadata: &ModelMetadata,
    model_binary: &[u8],
) -> Result<()> {
    let tar_gz_path = archive_path(output_path);

    if let Some(parent) = tar_gz_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create parent directory: {:?}", parent))?;
        }
    }

    let tar_gz_file = File::create(&tar_gz_path)
        .context(format!("Failed to create tar.gz file: {:?}", tar_gz_path))?;

    let encoder = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    let json_str = metadata.to_json_string()?;
    append_entry(&mut tar_builder, METADATA_ENTRY, json_str.as_bytes())?;
    append_entry(&mut tar_builder, MODEL_ENTRY, model_binary)?;

    tar_builder
        .finish()
        .context("Failed to finalize tar.gz archive")?;

    Ok(())
}

/// tarアーカイブにエントリを1つ追加
fn append_entry<W: std::io::Write>(
    builder: &mut Builder<W>,
    name: &str,
    bytes: &[u8],
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .context(format!("Failed to add {} to tar", name))?;
    Ok(())
}

/// Tar.gzから指定エントリの内容を読み込む
fn read_entry(tar_gz_path: &Path, entry_name: &str) -> Result<Vec<u8>> {
    let tar_gz_file = File::open(tar_gz_path)
        .context(format!("Failed to open tar.gz file: {:?}", tar_gz_path))?;

    let decoder = GzDecoder::new(tar_gz_file);
    let mut archive = Archive::new(decoder);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?;

        if path.to_str() == Some(entry_name) {
            let mut buffer = Vec::new();
            entry.read_to_end(&mut buffer)?;
            return Ok(buffer);
        }
    }

    Err(anyhow::anyhow!(
        "{} not found in tar.gz archive: {:?}",
        entry_name,
        tar_gz_path
    ))
}

/// Tar.gzからモデルメタデータを読み込む
pub fn load_metadata(tar_gz_path: &Path) -> Result<ModelMetadata> {
    let bytes = read_entry(tar_gz_path, METADATA_ENTRY)?;
    let json_str = String::from_utf8(bytes).context("metadata.json is not valid UTF-8")?;
    ModelMetadata::from_json_string(&json_str)
}

/// Tar.gzからモデルバイナリを読み込む
pub fn load_model_binary(tar_gz_path: &Path) -> Result<Vec<u8>> {
    read_entry(tar_gz_path, MODEL_ENTRY)
}

/// メタデータとモデルバイナリを共に読み込む
pub fn load_model_with_metadata(tar_gz_path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    let metadata = load_metadata(tar_gz_path)?;
    let model_binary = load_model_binary(tar_gz_path)?;
    Ok((metadata, model_binary))
}

/// メタデータをコンソールに表示
pub fn print_metadata_info(metadata: &ModelMetadata) {
    println!("\n=== モデルメタデータ ===");
    println!("学習サンプル数: {}", metadata.breed_labels.len());
    println!("分類クラス数: {}", metadata.num_classes);
    println!(
        "モデル入力サイズ: {}x{}",
        metadata.model_input_size, metadata.model_input_size
    );
    println!("作成日時: {}", metadata.trained_at);
    println!("========================");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_archive_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "breed_classifier_{}_{}.tar.gz",
            name,
            rand::random::<u32>()
        ))
    }

    fn sample_metadata() -> ModelMetadata {
        ModelMetadata::new(
            vec!["beagle".to_string(), "akita".to_string()],
            2,
            48,
        )
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_archive_path("roundtrip");
        let metadata = sample_metadata();
        let binary = vec![1u8, 2, 3, 4, 5];

        save_model_with_metadata(&path, &metadata, &binary).unwrap();

        let (loaded_metadata, loaded_binary) = load_model_with_metadata(&path).unwrap();
        assert_eq!(loaded_metadata.breed_labels, metadata.breed_labels);
        assert_eq!(loaded_metadata.num_classes, metadata.num_classes);
        assert_eq!(loaded_binary, binary);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_extension_is_appended() {
        let base = std::env::temp_dir().join(format!(
            "breed_classifier_ext_{}",
            rand::random::<u32>()
        ));
        save_model_with_metadata(&base, &sample_metadata(), &[0u8]).unwrap();

        let expected = base.with_extension("tar.gz");
        assert!(expected.exists());

        std::fs::remove_file(&expected).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let path = temp_archive_path("missing");
        assert!(load_metadata(&path).is_err());
        assert!(load_model_binary(&path).is_err());
    }
}
