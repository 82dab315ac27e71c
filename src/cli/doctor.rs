//! CLI `doctor` command: check configuration, model files and datastore reachability.

use anyhow::Result;

use vectorizer::config::VectorizerConfig;
use vectorizer::embedding::clip::{TEXT_MODEL_FILE, TOKENIZER_FILE, VISION_MODEL_FILE};
use vectorizer::store::supabase::SupabaseBackend;

/// Run diagnostics and print a health report.
pub async fn doctor(config: &VectorizerConfig) -> Result<()> {
    println!("Vectorizer Health Report");
    println!("========================");
    println!();

    let config_ok = match config.validate() {
        Ok(()) => {
            println!("Configuration:     OK");
            true
        }
        Err(e) => {
            println!("Configuration:     INVALID ({e})");
            false
        }
    };
    println!("  Store URL:       {}", display_or_unset(&config.store.url));
    println!("  Table:           {}", config.store.table);
    println!("  Bucket:          {}", config.store.bucket);
    println!("  Face service:    {}", config.face.url);
    println!();

    let cache_dir = config.resolved_cache_dir();
    println!("Embedding model:   {} ({})", config.embedding.model, cache_dir.display());
    let mut missing = 0;
    for file in [TEXT_MODEL_FILE, VISION_MODEL_FILE, TOKENIZER_FILE] {
        let path = cache_dir.join(file);
        match std::fs::metadata(&path) {
            Ok(meta) => println!("  {file:<17}{}", format_bytes(meta.len())),
            Err(_) => {
                missing += 1;
                println!("  {file:<17}MISSING");
            }
        }
    }
    if missing > 0 {
        println!("  Run `vectorizer model download` to fetch the model.");
    }
    println!();

    if !config_ok {
        println!("Datastore:         skipped (configuration invalid)");
        return Ok(());
    }

    let backend = SupabaseBackend::new(&config.store)?;
    match backend.ping().await {
        Ok(()) => println!("Datastore:         reachable"),
        Err(e) => println!("Datastore:         UNREACHABLE ({e})"),
    }

    Ok(())
}

fn display_or_unset(value: &str) -> &str {
    if value.trim().is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
