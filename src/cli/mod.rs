pub mod doctor;
pub mod images;
pub mod search;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use vectorizer::embedding::clip::{TEXT_MODEL_FILE, TOKENIZER_FILE, VISION_MODEL_FILE};

const MODEL_BASE_URL: &str = "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main";

/// (remote path, local file name, human size hint)
const MODEL_FILES: [(&str, &str, &str); 3] = [
    ("onnx/text_model.onnx", TEXT_MODEL_FILE, "~250MB"),
    ("onnx/vision_model.onnx", VISION_MODEL_FILE, "~350MB"),
    ("tokenizer.json", TOKENIZER_FILE, "~2MB"),
];

/// Download the CLIP text/vision ONNX exports and tokenizer to the cache directory.
pub async fn model_download(config: &vectorizer::config::EmbeddingConfig) -> Result<()> {
    let cache_dir = vectorizer::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for (remote, local, size) in MODEL_FILES {
        let dest = cache_dir.join(local);
        if dest.exists() {
            println!("{local} already exists at {}", dest.display());
            continue;
        }
        println!("Downloading {local} ({size})...");
        download_file(&format!("{MODEL_BASE_URL}/{remote}"), &dest).await?;
        println!("Saved to {}", dest.display());
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Download a file from a URL with progress bar. Uses atomic write (tmp + rename).
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}
