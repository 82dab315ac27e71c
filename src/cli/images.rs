use anyhow::Result;

use vectorizer::config::VectorizerConfig;
use vectorizer::service::group_images;
use vectorizer::store::supabase::SupabaseBackend;
use vectorizer::store::types::TenantScope;
use vectorizer::store::EmbeddingStore;

/// Print the distinct images stored for a scope. Needs only the datastore.
pub async fn images(config: &VectorizerConfig, event: &str, business: &str) -> Result<()> {
    config.validate()?;
    let scope = TenantScope::new(event, business)?;
    let backend = SupabaseBackend::new(&config.store)?;

    let images = group_images(backend.list_scoped(&scope).await?);
    if images.is_empty() {
        println!("No images stored for {scope}.");
        return Ok(());
    }

    println!("{} image(s) in {scope}\n", images.len());
    for image in &images {
        let created = image
            .created_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!("  {}  faces: {}  created: {}", image.image_url, image.face_count, created);
    }

    Ok(())
}
