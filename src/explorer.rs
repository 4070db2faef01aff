use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::PathBuf;

use polars::prelude::*;

use crate::config::Config;
use crate::error::{MapperError, Result};
use crate::tables::{read_parquet, relationship_frame, write_csv, ENTITIES_FILE, RELATIONSHIPS_FILE};

const DISPLAY_LIMIT: usize = 25;

/// Identifier columns surfaced in the identifier analysis.
const IDENTIFIER_COLUMNS: &[(&str, &str)] = &[
    ("inn_code", "Russian INN"),
    ("ogrn_code", "Russian OGRN"),
    ("lei_code", "LEI"),
    ("swift_bic", "SWIFT/BIC"),
    ("imo_number", "IMO"),
    ("registration_number", "Registration #"),
];

fn jurisdiction_name(code: &str) -> &str {
    match code {
        "vg" => "British Virgin Islands",
        "ky" => "Cayman Islands",
        "sc" => "Seychelles",
        "pa" => "Panama",
        "bz" => "Belize",
        "ws" => "Samoa",
        "mh" => "Marshall Islands",
        "cy" => "Cyprus",
        "mt" => "Malta",
        "lu" => "Luxembourg",
        other => other,
    }
}

/// Interactive text menu over the two parquet tables. Pure read side: it
/// filters, groups, and exports, and never mutates the tables.
pub struct Explorer {
    entities: DataFrame,
    relationships: DataFrame,
    high_risk_jurisdictions: Vec<String>,
    output_dir: PathBuf,
    last_results: Option<DataFrame>,
}

/// Load both tables and run the menu loop until the user quits.
pub fn run(config: &Config) -> Result<()> {
    let (entities, relationships) = load_tables(config)?;
    println!(
        "Loaded {} entities and {} relationships\n",
        entities.height(),
        relationships.height()
    );

    let mut explorer = Explorer {
        entities,
        relationships,
        high_risk_jurisdictions: config.matching.high_risk_jurisdictions.clone(),
        output_dir: config.output_dir(),
        last_results: None,
    };
    explorer.menu_loop()
}

/// Print table statistics for `snm analyze stats`.
pub fn print_stats(config: &Config) -> Result<()> {
    let (entities, relationships) = load_tables(config)?;

    println!("\nEntity statistics ({} total):", entities.height());
    for (schema, count) in value_counts(&entities, "schema")? {
        println!("  {:<16} {}", schema, count);
    }

    if relationships.height() > 0 {
        println!("\nRelationship statistics ({} total):", relationships.height());
        for (rel_type, count) in value_counts(&relationships, "relationship_type")? {
            println!("  {:<16} {}", rel_type, count);
        }
    }

    println!("\nTop source datasets:");
    for (dataset, count) in split_counts(&entities, "datasets", ',')?.into_iter().take(10) {
        println!("  {:<32} {}", dataset, count);
    }
    Ok(())
}

fn load_tables(config: &Config) -> Result<(DataFrame, DataFrame)> {
    let entities_path = config.processed_data_dir().join(ENTITIES_FILE);
    if !entities_path.exists() {
        return Err(MapperError::Config(
            "No data found. Run 'snm ingest opensanctions' first.".to_string(),
        ));
    }
    let entities = read_parquet(&entities_path)?;

    let relationships_path = config.processed_data_dir().join(RELATIONSHIPS_FILE);
    let relationships = if relationships_path.exists() {
        read_parquet(&relationships_path)?
    } else {
        relationship_frame(&[])?
    };
    Ok((entities, relationships))
}

impl Explorer {
    fn menu_loop(&mut self) -> Result<()> {
        print_menu();
        loop {
            let choice = prompt("\n> ")?;
            match choice.as_str() {
                "q" | "quit" | "exit" => {
                    println!("Goodbye!");
                    return Ok(());
                }
                "h" | "help" | "menu" => print_menu(),
                "1" => self.show_overview()?,
                "2" => self.search_by_name()?,
                "3" => self.browse_by_type()?,
                "4" => self.browse_by_country()?,
                "5" => self.high_risk_jurisdictions()?,
                "6" => self.ownership_analysis()?,
                "7" => self.sanctions_lists()?,
                "8" => self.recently_added()?,
                "9" => self.identifiers()?,
                "10" => self.export_results()?,
                "" => {}
                other => println!("Unknown command: {other}. Type 'h' for help."),
            }
        }
    }

    fn show_overview(&self) -> Result<()> {
        println!("\n=== OVERVIEW ===\n");
        println!("Total entities:      {}", self.entities.height());
        println!("Total relationships: {}", self.relationships.height());

        println!("\nEntity types:");
        let total = self.entities.height().max(1);
        for (schema, count) in value_counts(&self.entities, "schema")? {
            let pct = (count as f64 / total as f64) * 100.0;
            println!("  {:<16} {:>8}  {:.1}%", schema, count, pct);
        }

        if self.relationships.height() > 0 {
            println!("\nRelationship types:");
            for (rel_type, count) in value_counts(&self.relationships, "relationship_type")? {
                println!("  {:<16} {:>8}", rel_type, count);
            }
        }

        println!("\nTop 10 countries:");
        for (country, count) in split_counts(&self.entities, "countries", '|')?
            .into_iter()
            .take(10)
        {
            println!("  {:<8} {:>8}", country, count);
        }
        Ok(())
    }

    fn search_by_name(&mut self) -> Result<()> {
        let query = prompt("Enter search term: ")?.to_lowercase();
        if query.is_empty() {
            return Ok(());
        }

        let mask = contains_mask(&self.entities, &["names", "aliases", "caption"], &query)?;
        let results = filter_mask(&self.entities, &mask)?;
        println!("\nFound {} matches for '{}'\n", results.height(), query);
        if results.height() > 0 {
            display_results(&results, &[])?;
            self.last_results = Some(results);
        }
        Ok(())
    }

    fn browse_by_type(&mut self) -> Result<()> {
        let counts = value_counts(&self.entities, "schema")?;
        println!("\nAvailable types:");
        for (i, (schema, count)) in counts.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, schema, count);
        }

        let choice = prompt("\nEnter number or type name: ")?;
        let selected = match choice.parse::<usize>() {
            Ok(idx) if idx >= 1 && idx <= counts.len() => counts[idx - 1].0.clone(),
            _ => choice,
        };

        let mask = eq_mask(&self.entities, "schema", &selected)?;
        let results = filter_mask(&self.entities, &mask)?;
        if results.height() == 0 {
            println!("No entities of type '{selected}'");
            return Ok(());
        }
        println!("\nFound {} {} entities\n", results.height(), selected);
        display_results(&results, &[])?;
        self.last_results = Some(results);
        Ok(())
    }

    fn browse_by_country(&mut self) -> Result<()> {
        println!("\nTop countries:");
        for (country, count) in split_counts(&self.entities, "countries", '|')?
            .into_iter()
            .take(10)
        {
            println!("  {country}: {count}");
        }

        let code = prompt("\nEnter country code (e.g. RU, IR, CN): ")?.to_uppercase();
        if code.is_empty() {
            return Ok(());
        }

        let mask = contains_mask(&self.entities, &["countries"], &code.to_lowercase())?;
        let results = filter_mask(&self.entities, &mask)?;
        if results.height() == 0 {
            println!("No entities for country '{code}'");
            return Ok(());
        }
        println!("\nFound {} entities associated with {}\n", results.height(), code);
        display_results(&results, &[])?;
        self.last_results = Some(results);
        Ok(())
    }

    fn high_risk_jurisdictions(&mut self) -> Result<()> {
        println!("\n=== HIGH-RISK JURISDICTIONS ===\n");
        let company_mask = eq_mask(&self.entities, "schema", "Company")?;
        let companies = filter_mask(&self.entities, &company_mask)?;

        let mut total = 0usize;
        let mut rows: Vec<(String, usize)> = Vec::new();
        for code in &self.high_risk_jurisdictions {
            let mask = eq_mask(&companies, "jurisdiction", code)?;
            let count = mask.iter().filter(|hit| **hit).count();
            if count > 0 {
                rows.push((code.clone(), count));
                total += count;
            }
        }
        rows.sort_by(|a, b| b.1.cmp(&a.1));

        for (code, count) in &rows {
            println!("  {:<24} {:<4} {:>8}", jurisdiction_name(code), code, count);
        }
        println!("\nTotal companies in secrecy jurisdictions: {total}");

        if total > 0 && confirm("\nView company details?")? {
            let code = prompt("Enter jurisdiction code: ")?;
            let mask = eq_mask(&companies, "jurisdiction", &code)?;
            let results = filter_mask(&companies, &mask)?;
            if results.height() > 0 {
                display_results(&results, &[])?;
                self.last_results = Some(results);
            }
        }
        Ok(())
    }

    fn ownership_analysis(&mut self) -> Result<()> {
        println!("\n=== OWNERSHIP ANALYSIS ===\n");
        let mask = eq_mask(&self.relationships, "relationship_type", "owned_by")?;
        let owned_by = filter_mask(&self.relationships, &mask)?;
        if owned_by.height() == 0 {
            println!("No ownership relationships found.");
            return Ok(());
        }
        println!("Total ownership relationships: {}\n", owned_by.height());

        let top_owners: Vec<(String, usize)> = value_counts(&owned_by, "target_id")?
            .into_iter()
            .take(20)
            .collect();

        println!("Top owners:");
        for (i, (owner_id, count)) in top_owners.iter().enumerate() {
            let (caption, schema) = self.entity_label(owner_id)?;
            println!("  {:>2}. {:<45} {:<14} owns {}", i + 1, caption, schema, count);
        }

        if confirm("\nExplore a specific owner's holdings?")? {
            let idx = prompt("Enter owner number: ")?.parse::<usize>().unwrap_or(1);
            if idx >= 1 && idx <= top_owners.len() {
                let owner_id = &top_owners[idx - 1].0;
                let owned_ids: HashSet<String> = {
                    let targets = owned_by.column("target_id")?.str()?;
                    let sources = owned_by.column("source_id")?.str()?;
                    sources
                        .into_iter()
                        .zip(targets)
                        .filter(|(_, target)| *target == Some(owner_id.as_str()))
                        .filter_map(|(source, _)| source.map(str::to_string))
                        .collect()
                };

                let mask = in_set_mask(&self.entities, "entity_id", &owned_ids)?;
                let results = filter_mask(&self.entities, &mask)?;
                let (caption, _) = self.entity_label(owner_id)?;
                println!("\nEntities owned by {caption}:\n");
                display_results(&results, &[])?;
                self.last_results = Some(results);
            }
        }
        Ok(())
    }

    fn sanctions_lists(&mut self) -> Result<()> {
        println!("\n=== SANCTIONS LISTS BREAKDOWN ===\n");
        for (dataset, count) in split_counts(&self.entities, "datasets", ',')?
            .into_iter()
            .take(20)
        {
            println!("  {:<40} {:>8}", dataset, count);
        }

        if confirm("\nFilter by a specific dataset?")? {
            let dataset = prompt("Enter dataset name: ")?;
            let mask = contains_mask(&self.entities, &["datasets"], &dataset.to_lowercase())?;
            let results = filter_mask(&self.entities, &mask)?;
            if results.height() > 0 {
                println!("\nFound {} entities\n", results.height());
                display_results(&results, &[])?;
                self.last_results = Some(results);
            }
        }
        Ok(())
    }

    fn recently_added(&mut self) -> Result<()> {
        println!("\n=== RECENTLY ADDED ENTITIES ===\n");
        let first_seen = self.entities.column("first_seen")?.str()?;
        let mut year_counts: HashMap<String, usize> = HashMap::new();
        for value in first_seen.into_iter().flatten() {
            if value.len() >= 4 {
                *year_counts.entry(value[..4].to_string()).or_default() += 1;
            }
        }
        let mut years: Vec<&String> = year_counts.keys().collect();
        years.sort_by(|a, b| b.cmp(a));
        for year in years.iter().take(10) {
            println!("  {}  {:>8}", year, year_counts[*year]);
        }

        if confirm("\nView entities from a specific year?")? {
            let year = prompt("Enter year: ")?;
            let mask = starts_with_mask(&self.entities, "first_seen", &year)?;
            let results = filter_mask(&self.entities, &mask)?;
            if results.height() > 0 {
                display_results(&results, &[])?;
                self.last_results = Some(results);
            }
        }
        Ok(())
    }

    fn identifiers(&mut self) -> Result<()> {
        println!("\n=== ENTITIES WITH IDENTIFIERS ===\n");
        for (column, label) in IDENTIFIER_COLUMNS {
            let mask = non_empty_mask(&self.entities, column)?;
            let count = mask.iter().filter(|hit| **hit).count();
            println!("  {:<16} {:>8}", label, count);
        }

        println!("\n1. Russian INN  2. LEI  3. IMO  4. Back");
        let choice = prompt("Select: ")?;
        let column = match choice.as_str() {
            "1" => "inn_code",
            "2" => "lei_code",
            "3" => "imo_number",
            _ => return Ok(()),
        };
        let mask = non_empty_mask(&self.entities, column)?;
        let results = filter_mask(&self.entities, &mask)?;
        display_results(&results, &[column])?;
        self.last_results = Some(results);
        Ok(())
    }

    fn export_results(&mut self) -> Result<()> {
        let results = match &self.last_results {
            Some(results) if results.height() > 0 => results.clone(),
            _ => {
                println!("No results to export. Run a search or analysis first.");
                return Ok(());
            }
        };

        let mut filename = prompt("Enter filename [export.csv]: ")?;
        if filename.is_empty() {
            filename = "export.csv".to_string();
        }
        if !filename.ends_with(".csv") {
            filename.push_str(".csv");
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(filename);
        let mut df = results;
        write_csv(&mut df, &path)?;
        println!("Exported {} rows to {}", df.height(), path.display());
        Ok(())
    }

    /// Caption and schema for an entity id, or the id itself when the
    /// target is dangling.
    fn entity_label(&self, entity_id: &str) -> Result<(String, String)> {
        let ids = self.entities.column("entity_id")?.str()?;
        let captions = self.entities.column("caption")?.str()?;
        let schemas = self.entities.column("schema")?.str()?;
        for (i, id) in ids.into_iter().enumerate() {
            if id == Some(entity_id) {
                let caption = captions.get(i).unwrap_or(entity_id).to_string();
                let schema = schemas.get(i).unwrap_or("").to_string();
                return Ok((caption, schema));
            }
        }
        Ok((entity_id.to_string(), String::new()))
    }
}

fn print_menu() {
    println!(
        "\n==============================================================\n\
         \x20             SANCTIONS DATA EXPLORER\n\
         ==============================================================\n\
         \n\
         EXPLORE\n\
         \x20 1  Overview & statistics\n\
         \x20 2  Search by name\n\
         \x20 3  Browse by entity type (Person, Company, ...)\n\
         \x20 4  Browse by country\n\
         \n\
         ANALYZE\n\
         \x20 5  High-risk jurisdictions (shell companies)\n\
         \x20 6  Ownership analysis (who owns what)\n\
         \x20 7  Sanctions lists breakdown\n\
         \x20 8  Recently added entities\n\
         \x20 9  Entities with identifiers (INN, LEI, ...)\n\
         \n\
         EXPORT\n\
         \x20 10 Export last results to CSV\n\
         \n\
         OTHER\n\
         \x20 h  Show this menu\n\
         \x20 q  Quit"
    );
}

fn prompt(text: &str) -> Result<String> {
    print!("{text}");
    io::stdout().flush()?;
    let mut line = String::new();
    let bytes = io::stdin().read_line(&mut line)?;
    if bytes == 0 {
        // EOF behaves like quit
        return Ok("q".to_string());
    }
    Ok(line.trim().to_string())
}

fn confirm(text: &str) -> Result<bool> {
    let answer = prompt(&format!("{text} [y/N]: "))?;
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// Count occurrences of whole column values, most frequent first.
fn value_counts(df: &DataFrame, column: &str) -> Result<Vec<(String, usize)>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in df.column(column)?.str()?.into_iter().flatten() {
        if !value.is_empty() {
            *counts.entry(value.to_string()).or_default() += 1;
        }
    }
    Ok(sorted_desc(counts))
}

/// Count occurrences of delimited values within a column (datasets,
/// countries), most frequent first.
fn split_counts(df: &DataFrame, column: &str, sep: char) -> Result<Vec<(String, usize)>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in df.column(column)?.str()?.into_iter().flatten() {
        for part in value.split(sep) {
            if !part.is_empty() {
                *counts.entry(part.to_string()).or_default() += 1;
            }
        }
    }
    Ok(sorted_desc(counts))
}

fn sorted_desc(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

fn filter_mask(df: &DataFrame, mask: &[bool]) -> Result<DataFrame> {
    let mask: BooleanChunked = mask.iter().map(|hit| Some(*hit)).collect();
    Ok(df.filter(&mask)?)
}

/// Case-insensitive substring match over any of the given columns.
fn contains_mask(df: &DataFrame, columns: &[&str], needle_lower: &str) -> Result<Vec<bool>> {
    let mut mask = vec![false; df.height()];
    for column in columns {
        for (i, value) in df.column(column)?.str()?.into_iter().enumerate() {
            if let Some(value) = value {
                if value.to_lowercase().contains(needle_lower) {
                    mask[i] = true;
                }
            }
        }
    }
    Ok(mask)
}

fn eq_mask(df: &DataFrame, column: &str, needle: &str) -> Result<Vec<bool>> {
    Ok(df
        .column(column)?
        .str()?
        .into_iter()
        .map(|value| value == Some(needle))
        .collect())
}

fn starts_with_mask(df: &DataFrame, column: &str, prefix: &str) -> Result<Vec<bool>> {
    Ok(df
        .column(column)?
        .str()?
        .into_iter()
        .map(|value| value.map(|v| v.starts_with(prefix)).unwrap_or(false))
        .collect())
}

fn non_empty_mask(df: &DataFrame, column: &str) -> Result<Vec<bool>> {
    Ok(df
        .column(column)?
        .str()?
        .into_iter()
        .map(|value| value.map(|v| !v.is_empty()).unwrap_or(false))
        .collect())
}

fn in_set_mask(df: &DataFrame, column: &str, set: &HashSet<String>) -> Result<Vec<bool>> {
    Ok(df
        .column(column)?
        .str()?
        .into_iter()
        .map(|value| value.map(|v| set.contains(v)).unwrap_or(false))
        .collect())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        value.chars().take(width).collect()
    }
}

fn display_results(df: &DataFrame, extra_columns: &[&str]) -> Result<()> {
    let captions = df.column("caption")?.str()?;
    let schemas = df.column("schema")?.str()?;
    let countries = df.column("countries")?.str()?;
    let jurisdictions = df.column("jurisdiction")?.str()?;

    print!("  {:>4} {:<40} {:<12} {:<12} {:<10}", "#", "Name", "Type", "Countries", "Jurisdiction");
    for column in extra_columns {
        print!(" {:<15}", column);
    }
    println!();

    let shown = df.height().min(DISPLAY_LIMIT);
    for i in 0..shown {
        print!(
            "  {:>4} {:<40} {:<12} {:<12} {:<10}",
            i + 1,
            truncate(captions.get(i).unwrap_or(""), 40),
            truncate(schemas.get(i).unwrap_or(""), 12),
            truncate(countries.get(i).unwrap_or(""), 12),
            truncate(jurisdictions.get(i).unwrap_or(""), 10),
        );
        for column in extra_columns {
            let values = df.column(column)?.str()?;
            print!(" {:<15}", truncate(values.get(i).unwrap_or(""), 15));
        }
        println!();
    }

    if df.height() > DISPLAY_LIMIT {
        println!(
            "  Showing {} of {}. Export to CSV to see all.",
            DISPLAY_LIMIT,
            df.height()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftm::{normalize_lines, Relationship};
    use crate::tables::entity_frame;

    fn sample_frame() -> DataFrame {
        let lines = vec![
            r#"{"id":"p1","schema":"Person","caption":"Ivan Petrov","datasets":["us_ofac_sdn"],"properties":{"name":["Ivan Petrov"],"country":["ru"],"innCode":["500100732259"]}}"#,
            r#"{"id":"c1","schema":"Company","caption":"Island Holdings","datasets":["us_ofac_sdn","eu_fsf"],"properties":{"name":["Island Holdings"],"jurisdiction":["vg"],"ownershipOwner":["p1"]}}"#,
            r#"{"id":"c2","schema":"Company","caption":"Mainland Trade","datasets":["eu_fsf"],"properties":{"jurisdiction":["de"]}}"#,
        ];
        let (rows, _, _) = normalize_lines(lines);
        entity_frame(&rows).unwrap()
    }

    #[test]
    fn value_counts_sorts_by_frequency() {
        let df = sample_frame();
        let counts = value_counts(&df, "schema").unwrap();
        assert_eq!(counts[0], ("Company".to_string(), 2));
        assert_eq!(counts[1], ("Person".to_string(), 1));
    }

    #[test]
    fn split_counts_handles_delimited_columns() {
        let df = sample_frame();
        let counts = split_counts(&df, "datasets", ',').unwrap();
        assert_eq!(counts[0], ("eu_fsf".to_string(), 2));
        assert_eq!(counts[1], ("us_ofac_sdn".to_string(), 2));
    }

    #[test]
    fn masks_filter_rows() {
        let df = sample_frame();

        let mask = eq_mask(&df, "jurisdiction", "vg").unwrap();
        let high_risk = filter_mask(&df, &mask).unwrap();
        assert_eq!(high_risk.height(), 1);

        let mask = contains_mask(&df, &["names", "caption"], "petrov").unwrap();
        let hits = filter_mask(&df, &mask).unwrap();
        assert_eq!(hits.height(), 1);

        let mask = non_empty_mask(&df, "inn_code").unwrap();
        assert_eq!(mask.iter().filter(|hit| **hit).count(), 1);
    }

    #[test]
    fn ownership_edges_resolve_to_owned_entities() {
        let edges = vec![Relationship {
            source_id: "c1".to_string(),
            target_id: "p1".to_string(),
            relationship_type: "owned_by".to_string(),
        }];
        let df = relationship_frame(&edges).unwrap();
        let mask = eq_mask(&df, "relationship_type", "owned_by").unwrap();
        let owned_by = filter_mask(&df, &mask).unwrap();
        assert_eq!(owned_by.height(), 1);
        let counts = value_counts(&owned_by, "target_id").unwrap();
        assert_eq!(counts[0], ("p1".to_string(), 1));
    }
}
