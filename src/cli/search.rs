use anyhow::Result;

use vectorizer::config::VectorizerConfig;
use vectorizer::service::ServiceError;
use vectorizer::store::types::TenantScope;

/// Run a text-prompt search from the terminal.
pub async fn search(
    config: &VectorizerConfig,
    prompt: &str,
    event: &str,
    business: &str,
    top_k: Option<usize>,
) -> Result<()> {
    config.validate()?;
    let scope = TenantScope::new(event, business)?;
    let vectorizer = vectorizer::server::build_vectorizer(config)?;

    let top_k = top_k.unwrap_or(config.retrieval.text_top_k);
    let results = match vectorizer
        .find_by_text(prompt, &scope, top_k, config.retrieval.text_threshold)
        .await
    {
        Ok(results) => results,
        Err(ServiceError::NoEmbeddings) => {
            println!("No embeddings found for {scope}.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s) in {scope}\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!("  {}. {} (score: {:.4})", i + 1, result.image_url, result.similarity);
    }

    Ok(())
}
