//! 犬種分類の推論Webサービス
//!
//! ルートは2つだけの単一プロセスHTTPサーバーです。
//! - `GET /` : アップロードページ（HTMLテンプレート）
//! - `POST /upload` : multipartの`image`フィールドを分類して
//!   `{"prediction": "<犬種>"}` を返す
//!
//! モデルとラベル集合は起動時に一度だけ読み込まれ、以降は読み取り専用の
//! サービスコンテキストとして全ハンドラに共有されます。

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ml::InferenceEngine;

/// リクエストハンドラに共有されるサービスコンテキスト
///
/// 起動時に一度だけ構築され、以降は不変です。
pub struct ServiceContext {
    /// 読み込み済みの推論エンジン
    pub engine: InferenceEngine,
    /// インデックスページのHTMLテンプレート
    pub template_path: PathBuf,
    /// アップロード画像の一時ファイル置き場
    pub upload_dir: PathBuf,
}

impl ServiceContext {
    pub fn new(engine: InferenceEngine, template_path: PathBuf, upload_dir: PathBuf) -> Self {
        Self {
            engine,
            template_path,
            upload_dir,
        }
    }
}

/// リクエストごとの一時アップロードファイル
///
/// 固定パスへの上書きは同時リクエストで競合するため、リクエストごとに
/// 一意なファイル名で保存し、スコープを抜けた時点で確実に削除します。
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// アップロードされたバイト列を一意な一時ファイルへ書き込む
    pub fn create(dir: &Path, bytes: &[u8]) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .context(format!("Failed to create upload directory: {:?}", dir))?;

        let name = format!(
            "upload_{}_{:08x}.jpg",
            chrono::Utc::now().timestamp_micros(),
            rand::random::<u32>()
        );
        let path = dir.join(name);

        std::fs::write(&path, bytes)
            .context(format!("Failed to write uploaded image: {:?}", path))?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).ok();
    }
}

/// ルーターを構築
pub fn build_router(ctx: Arc<ServiceContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .with_state(ctx)
}

/// サーバーを起動して待ち受ける
pub async fn run(ctx: Arc<ServiceContext>, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .context(format!("Failed to bind: {}", bind_addr))?;

    println!("http://{} で待ち受け中", listener.local_addr()?);

    axum::serve(listener, build_router(ctx))
        .await
        .context("Server error")?;

    Ok(())
}

/// `GET /` : アップロードページを返す
async fn index(State(ctx): State<Arc<ServiceContext>>) -> Response {
    match tokio::fs::read_to_string(&ctx.template_path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            eprintln!(
                "テンプレートの読み込みエラー ({}): {}",
                ctx.template_path.display(),
                e
            );
            server_error(format!("Failed to read template: {}", e))
        }
    }
}

/// `POST /upload` : 画像を分類して予測ラベルを返す
///
/// `image`フィールドが無い場合のみクライアントエラー（400）。
/// それ以外の失敗（画像デコード不可、推論エラー等）は一律500になります。
async fn upload(State(ctx): State<Arc<ServiceContext>>, mut multipart: Multipart) -> Response {
    let mut image_bytes: Option<Bytes> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("image") {
                    match field.bytes().await {
                        Ok(bytes) => {
                            image_bytes = Some(bytes);
                            break;
                        }
                        Err(e) => return server_error(format!("Failed to read upload: {}", e)),
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response()
            }
        }
    }

    let Some(bytes) = image_bytes else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No file uploaded" })),
        )
            .into_response();
    };

    let upload = match TempUpload::create(&ctx.upload_dir, &bytes) {
        Ok(upload) => upload,
        Err(e) => return server_error(e.to_string()),
    };

    // 推論はCPU負荷が高いためブロッキングスレッドで実行する
    let result = tokio::task::spawn_blocking(move || {
        let label = ctx.engine.classify_image(upload.path());
        drop(upload); // 一時ファイルをここで確実に削除
        label
    })
    .await;

    match result {
        Ok(Ok(label)) => {
            println!("予測結果: {}", label);
            (StatusCode::OK, Json(json!({ "prediction": label }))).into_response()
        }
        Ok(Err(e)) => {
            eprintln!("分類エラー: {}", e);
            server_error(e.to_string())
        }
        Err(e) => server_error(format!("Inference task failed: {}", e)),
    }
}

fn server_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}
