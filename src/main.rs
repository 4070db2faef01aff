use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;

use snm_mapper::apis::opencorporates::OpenCorporatesClient;
use snm_mapper::apis::opensanctions::ingest_opensanctions;
use snm_mapper::apis::uk_companies_house::CompaniesHouseClient;
use snm_mapper::config::Config;
use snm_mapper::{explorer, logging, report};

#[derive(Parser)]
#[command(name = "snm")]
#[command(about = "Sanctions network mapper: ingest, normalize, and explore sanctions data")]
#[command(version = "0.1.0")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and normalize source data
    Ingest {
        #[command(subcommand)]
        source: IngestCommands,
    },
    /// Analyze the processed tables
    Analyze {
        #[command(subcommand)]
        analysis: AnalyzeCommands,
    },
    /// Generate reports from the processed tables
    Report {
        #[command(subcommand)]
        kind: ReportCommands,
    },
}

#[derive(Subcommand)]
enum IngestCommands {
    /// Download an OpenSanctions dataset and build the parquet tables
    Opensanctions {
        /// Dataset to ingest. Available: default, sanctions, peps, crime
        #[arg(long, default_value = "sanctions")]
        dataset: String,
        /// Re-download even if today's file is cached
        #[arg(long)]
        force: bool,
        /// Directory for the parquet tables (default: data/processed)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Query corporate registries for companies and officers
    Corporate {
        /// Registry to query: uk (Companies House) or oc (OpenCorporates)
        #[arg(long)]
        source: String,
        /// Company name to search for
        #[arg(long)]
        query: Option<String>,
        /// Company number to look up directly
        #[arg(long)]
        company: Option<String>,
        /// Jurisdiction code for lookups (e.g. gb, us_de)
        #[arg(long)]
        jurisdiction: Option<String>,
        /// Officer name to search for
        #[arg(long)]
        officer: Option<String>,
    },
}

#[derive(Subcommand)]
enum AnalyzeCommands {
    /// Print table statistics
    Stats,
    /// Interactive data explorer
    Explore,
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Write a markdown summary of the processed tables
    Summary {
        /// Report file path (default: data/output/summary_YYYYMMDD.md)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = Config::load()?;
    config.ensure_directories()?;

    match cli.command {
        Commands::Ingest { source } => match source {
            IngestCommands::Opensanctions {
                dataset,
                force,
                output,
            } => {
                println!("🔄 Ingesting OpenSanctions dataset '{dataset}'...");
                match ingest_opensanctions(&config, &dataset, output.as_deref(), force).await {
                    Ok(summary) => {
                        println!("\n📊 Ingest results for {dataset}:");
                        println!("   Lines read:    {}", summary.stats.lines);
                        println!("   Parsed:        {}", summary.stats.parsed);
                        println!("   Parse errors:  {}", summary.stats.errors);
                        println!("   Entities:      {}", summary.entities);
                        println!("   Relationships: {}", summary.relationships);
                        println!("   Entity table:  {}", summary.entities_path.display());
                        println!(
                            "   Relationship table: {}",
                            summary.relationships_path.display()
                        );
                    }
                    Err(e) => {
                        error!("Ingest failed: {}", e);
                        println!("❌ Ingest failed: {e}");
                    }
                }
            }
            IngestCommands::Corporate {
                source,
                query,
                company,
                jurisdiction,
                officer,
            } => run_corporate(&config, &source, query, company, jurisdiction, officer).await?,
        },
        Commands::Analyze { analysis } => match analysis {
            AnalyzeCommands::Stats => explorer::print_stats(&config)?,
            AnalyzeCommands::Explore => explorer::run(&config)?,
        },
        Commands::Report { kind } => match kind {
            ReportCommands::Summary { output } => {
                let path = report::generate_summary(&config, output)?;
                println!("✅ Report written to {}", path.display());
            }
        },
    }
    Ok(())
}

async fn run_corporate(
    config: &Config,
    source: &str,
    query: Option<String>,
    company: Option<String>,
    jurisdiction: Option<String>,
    officer: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    match source {
        "uk" => {
            let client = CompaniesHouseClient::new(config)?;
            if let Some(query) = &query {
                println!("🔍 Searching UK Companies House for '{query}'...");
                for hit in client.search_companies(query, 10).await? {
                    let title = hit.get("title").and_then(|v| v.as_str()).unwrap_or("?");
                    let number = hit
                        .get("company_number")
                        .and_then(|v| v.as_str())
                        .unwrap_or("?");
                    let status = hit
                        .get("company_status")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown");
                    println!("   {title} ({number}, {status})");
                }
            }
            if let Some(number) = &company {
                match client.get_company(number).await? {
                    Some(profile) => {
                        println!("🏢 {profile}");
                        let psc = client.get_persons_significant_control(number, false).await?;
                        println!("   Persons with significant control: {}", psc.len());
                        for person in &psc {
                            println!(
                                "   - {} ({})",
                                person.name.as_deref().unwrap_or("Unknown"),
                                person.control_summary()
                            );
                        }
                    }
                    None => println!("⚠️  No UK company found for {number}"),
                }
            }
            if officer.is_some() {
                println!("⚠️  Officer search is only available via --source oc");
            }
        }
        "oc" | "opencorporates" => {
            let client = OpenCorporatesClient::new(config)?;
            if let Some(query) = &query {
                println!("🔍 Searching OpenCorporates for '{query}'...");
                for company in client
                    .search_companies(query, jurisdiction.as_deref(), None, None, 10)
                    .await?
                {
                    println!("   {company}");
                }
            }
            if let Some(number) = &company {
                let jurisdiction = jurisdiction.as_deref().unwrap_or("gb");
                match client.get_company(jurisdiction, number).await? {
                    Some(company) => println!("🏢 {company}"),
                    None => println!("⚠️  No company found for {jurisdiction}/{number}"),
                }
            }
            if let Some(name) = &officer {
                println!("🔍 Searching officers named '{name}'...");
                for hit in client
                    .search_officers(name, jurisdiction.as_deref(), 10)
                    .await?
                {
                    println!("   {} at {}", hit.name, hit.company_name);
                }
            }
        }
        other => {
            println!("⚠️  Unknown registry: {other}. Available: uk, oc");
        }
    }
    Ok(())
}
