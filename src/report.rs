use std::fs;
use std::path::PathBuf;

use chrono::Local;
use polars::prelude::*;
use tracing::info;

use crate::config::Config;
use crate::error::{MapperError, Result};
use crate::tables::{read_parquet, ENTITIES_FILE, RELATIONSHIPS_FILE};

/// Write a markdown summary of the processed tables and return its path.
pub fn generate_summary(config: &Config, output: Option<PathBuf>) -> Result<PathBuf> {
    let entities_path = config.processed_data_dir().join(ENTITIES_FILE);
    if !entities_path.exists() {
        return Err(MapperError::Config(
            "No data found. Run 'snm ingest opensanctions' first.".to_string(),
        ));
    }
    let entities = read_parquet(&entities_path)?;

    let relationships_path = config.processed_data_dir().join(RELATIONSHIPS_FILE);
    let relationship_count = if relationships_path.exists() {
        read_parquet(&relationships_path)?.height()
    } else {
        0
    };

    let report = render_summary(&entities, relationship_count)?;

    let path = match output {
        Some(path) => path,
        None => {
            let output_dir = config.output_dir();
            fs::create_dir_all(&output_dir)?;
            output_dir.join(Local::now().format("summary_%Y%m%d.md").to_string())
        }
    };
    fs::write(&path, report)?;
    info!("Wrote summary report to {}", path.display());
    Ok(path)
}

fn render_summary(entities: &DataFrame, relationship_count: usize) -> Result<String> {
    let mut report = String::new();
    report.push_str("# Sanctions Data Summary\n\n");
    report.push_str(&format!(
        "Generated: {}\n\n",
        Local::now().format("%Y-%m-%d %H:%M")
    ));
    report.push_str(&format!("- Total entities: {}\n", entities.height()));
    report.push_str(&format!("- Total relationships: {}\n\n", relationship_count));

    report.push_str("## Entities by type\n\n");
    report.push_str("| Type | Count |\n|---|---|\n");
    for (schema, count) in schema_counts(entities)? {
        report.push_str(&format!("| {} | {} |\n", schema, count));
    }
    Ok(report)
}

fn schema_counts(entities: &DataFrame) -> Result<Vec<(String, usize)>> {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for value in entities.column("schema")?.str()?.into_iter().flatten() {
        if !value.is_empty() {
            *counts.entry(value.to_string()).or_default() += 1;
        }
    }
    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftm::normalize_lines;
    use crate::tables::entity_frame;

    #[test]
    fn summary_includes_totals_and_schema_table() {
        let lines = vec![
            r#"{"id":"p1","schema":"Person","caption":"A"}"#,
            r#"{"id":"p2","schema":"Person","caption":"B"}"#,
            r#"{"id":"c1","schema":"Company","caption":"C"}"#,
        ];
        let (rows, _, _) = normalize_lines(lines);
        let entities = entity_frame(&rows).unwrap();

        let report = render_summary(&entities, 7).unwrap();
        assert!(report.contains("Total entities: 3"));
        assert!(report.contains("Total relationships: 7"));
        assert!(report.contains("| Person | 2 |"));
        assert!(report.contains("| Company | 1 |"));
    }
}
