mod chunk;
mod config;
mod index;
mod ingest;
mod search;

pub use chunk::ChunkArgs;
pub use config::ConfigCommand;
pub use index::IndexCommand;
pub use ingest::IngestArgs;
pub use search::SearchArgs;

pub use chunk::handle_chunk;
pub use config::handle_config;
pub use index::handle_index;
pub use ingest::handle_ingest;
pub use search::handle_search;

use anyhow::{Context, Result};

use crate::models::{Config, MetadataFilter, MetadataValue, VectorDriver};
use crate::services::{
    Pipeline, VectorIndexManager, build_chunker, build_encoder, build_reranker,
};

/// Connect to the configured backend and open (or create) `index_name`
/// with the encoder's dimension.
pub(crate) async fn build_pipeline(config: &Config, index_name: &str) -> Result<Pipeline> {
    if config.index.driver == VectorDriver::Memory {
        tracing::warn!("memory driver selected, indexed data will not outlive this process");
    }

    let manager = VectorIndexManager::from_config(&config.index)
        .await
        .with_context(|| format!("failed to connect to {} backend", config.index.driver))?;
    let encoder = build_encoder(&config.encoder).context("failed to load encoder")?;
    let index = manager
        .ensure_index(
            index_name,
            encoder.dimension(),
            config.index.metric,
            config.index.placement.clone(),
        )
        .await
        .with_context(|| format!("failed to open index '{index_name}'"))?;

    let mut pipeline = Pipeline::new(build_chunker(&config.chunking), encoder, index)?;
    if let Some(reranker) = build_reranker(&config.encoder).context("failed to load re-ranker")? {
        pipeline = pipeline.with_reranker(reranker, config.encoder.reranker.candidates as usize);
    }
    Ok(pipeline)
}

/// Ask on stdin; anything but `y` declines.
pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    println!("{prompt} [y/N]");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Parse `key=value` pairs into an equality filter. Values that look like
/// booleans or numbers are typed accordingly.
pub(crate) fn parse_filter(pairs: &[String]) -> Result<Option<MetadataFilter>> {
    if pairs.is_empty() {
        return Ok(None);
    }

    let mut filter = MetadataFilter::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid filter '{pair}', expected key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("invalid filter '{pair}', key must not be empty");
        }
        filter = filter.eq(key, parse_value(value.trim()));
    }
    Ok(Some(filter))
}

fn parse_value(raw: &str) -> MetadataValue {
    if let Ok(b) = raw.parse::<bool>() {
        b.into()
    } else if let Ok(n) = raw.parse::<i64>() {
        n.into()
    } else if let Ok(x) = raw.parse::<f64>()
        && x.is_finite()
    {
        x.into()
    } else {
        raw.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_types_values() {
        let pairs = vec![
            "lang=rust".to_string(),
            "page=3".to_string(),
            "draft=false".to_string(),
            "weight=0.5".to_string(),
        ];
        let filter = parse_filter(&pairs).unwrap().unwrap();
        assert_eq!(
            filter.must,
            vec![
                ("lang".to_string(), MetadataValue::String("rust".to_string())),
                ("page".to_string(), MetadataValue::Integer(3)),
                ("draft".to_string(), MetadataValue::Bool(false)),
                ("weight".to_string(), MetadataValue::Float(0.5)),
            ]
        );
    }

    #[test]
    fn test_parse_filter_rejects_malformed() {
        assert!(parse_filter(&[]).unwrap().is_none());
        assert!(parse_filter(&["novalue".to_string()]).is_err());
        assert!(parse_filter(&["=x".to_string()]).is_err());
        assert_eq!(
            parse_filter(&["name=NaN".to_string()]).unwrap().unwrap().must[0].1,
            MetadataValue::String("NaN".to_string())
        );
    }

    #[tokio::test]
    async fn test_build_pipeline_with_defaults() {
        let config = Config::default();
        let pipeline = build_pipeline(&config, "cli-test").await.unwrap();
        assert_eq!(pipeline.index().name(), "cli-test");
        assert_eq!(
            pipeline.index().dimension(),
            config.encoder.dimension as usize
        );
    }
}
