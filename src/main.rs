use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use ro_migration_audit::append::{append_extracts, discover_extracts};
use ro_migration_audit::compare::{apply_product_match, compare, ComparisonInputs, ComparisonSummary};
use ro_migration_audit::export::{write_records, write_table, write_text};
use ro_migration_audit::joins::analyse_joins;
use ro_migration_audit::loaders::compare_loaders;
use ro_migration_audit::logging;
use ro_migration_audit::models::Config;
use ro_migration_audit::registration::enrich_loader;
use ro_migration_audit::report;
use ro_migration_audit::table::Table;
use ro_migration_audit::vault::{VaultClient, REGULATORY_OBJECTIVE_QUERY};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

const RULE: &str = "======================================================================";

fn cli() -> Command {
    Command::new("ro-migration-audit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reconciles regulatory objectives across MVS, RO loader sheets and RIM")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(Command::new("append").about("Append all MVS extracts into one CSV with a quality report"))
        .subcommand(
            Command::new("extract")
                .about("Pull the regulatory objective extract from RIM")
                .arg(
                    Arg::new("base-url")
                        .long("base-url")
                        .env("VAULT_BASE_URL")
                        .required(true)
                        .help("Vault API base URL, e.g. https://myvault.veevavault.com/api/v23.1"),
                )
                .arg(Arg::new("username").long("username").env("VAULT_USERNAME").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("VAULT_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(
                    Arg::new("rate-limit-ms")
                        .long("rate-limit-ms")
                        .env("VAULT_RATE_LIMIT_MS")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("100")
                        .help("Pause between result pages"),
                ),
        )
        .subcommand(Command::new("compare").about("Compare MVS unique IDs, green lights and products across systems"))
        .subcommand(
            Command::new("products")
                .about("Recompute the product match over an existing comparison CSV")
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .value_name("FILE")
                        .help("Comparison CSV (defaults to the configured comparison output)"),
                ),
        )
        .subcommand(Command::new("loaders").about("Compare RO loader expectations with RIM creations and updates"))
        .subcommand(Command::new("joins").about("Count RIM joins for ROs created and updated during the migration"))
        .subcommand(Command::new("loader-reg").about("Expand the RO create loader with linked registration details"))
        .subcommand(Command::new("all").about("Run compare, loaders and joins"))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();
    let matches = cli().get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to load configuration: {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please review {} (paths, column names, migration window) and run again.", config_file);
        return Ok(());
    };

    fs::create_dir_all(&config.outputs.output_directory).with_context(|| {
        format!("Failed to create output directory: {}", config.outputs.output_directory)
    })?;

    match matches.subcommand() {
        Some(("append", _)) => run_append(&config)?,
        Some(("extract", args)) => run_extract(&config, args).await?,
        Some(("compare", _)) => run_compare(&config)?,
        Some(("products", args)) => run_products(&config, args)?,
        Some(("loaders", _)) => run_loaders(&config)?,
        Some(("joins", _)) => run_joins(&config)?,
        Some(("loader-reg", _)) => run_loader_registrations(&config)?,
        Some(("all", _)) => {
            run_compare(&config)?;
            run_loaders(&config)?;
            run_joins(&config)?;
        }
        _ => bail!("no command given"),
    }

    Ok(())
}

fn banner(title: &str) {
    println!("{}", RULE);
    println!("{}", title);
    println!("{}", RULE);
}

fn done(outputs: &[&Path]) {
    println!("\n{}", RULE);
    println!("✅ COMPLETED SUCCESSFULLY");
    for output in outputs {
        println!("📂 Output file: {}", output.display());
    }
    println!("{}", RULE);
}

fn load_table(name: &str, path: &str) -> Result<Table> {
    let path = Path::new(path);
    if !path.exists() {
        bail!("{} not found: {}", name, path.display());
    }
    println!("📄 Reading {}: {}", name, path.display());
    let table = Table::from_csv_path(name, path)?;
    println!("   ✅ Loaded {} rows", table.len());
    Ok(table)
}

fn run_append(config: &Config) -> Result<()> {
    banner("MVS FILES APPEND");

    let source_dir = Path::new(&config.inputs.mvs_source_directory);
    let files = discover_extracts(source_dir)?;
    if files.is_empty() {
        bail!("No CSV extracts found in {}", source_dir.display());
    }
    println!("🔍 Found {} extract files", files.len());

    let (combined, quality) = append_extracts(&files, config.mvs_header_skip_rows)?;

    let output = Path::new(&config.inputs.mvs_appended);
    write_table(output, &combined, &config.export.lock_retry)?;
    println!("   ✅ Written {} rows", combined.len());

    let report_path = config.output_path(&config.outputs.append_quality_report);
    write_text(&report_path, &report::append_quality(&quality), &config.export.lock_retry)?;

    done(&[output, &report_path]);
    Ok(())
}

async fn run_extract(config: &Config, args: &ArgMatches) -> Result<()> {
    banner("RIM PROD DATA EXTRACTION");
    let started = Instant::now();

    let base_url = args.get_one::<String>("base-url").context("missing --base-url")?;
    let username = args.get_one::<String>("username").context("missing --username")?;
    let password = args.get_one::<String>("password").context("missing --password")?;
    let delay_ms = args.get_one::<u64>("rate-limit-ms").copied().unwrap_or(100);

    let mut client = VaultClient::new(base_url, Duration::from_millis(delay_ms));
    client.authenticate(username, password).await?;
    println!("✓ Authentication successful");

    let records = client.query_all(REGULATORY_OBJECTIVE_QUERY).await?;
    if records.is_empty() {
        bail!("No records returned from query (empty object, bad query, or missing permissions)");
    }

    let extract = Table::from_records("RIM extract", &records);
    let output = Path::new(&config.inputs.rim_migration_extract);
    write_table(output, &extract, &config.export.lock_retry)?;
    println!("✓ Saved {} records, {} columns", extract.len(), extract.headers().len());

    let elapsed = started.elapsed().as_secs_f64();
    let summary_path = config.output_path(&config.outputs.extract_summary);
    write_text(
        &summary_path,
        &report::extract_summary(extract.len(), extract.headers(), elapsed),
        &config.export.lock_retry,
    )?;

    done(&[output, &summary_path]);
    Ok(())
}

fn run_compare(config: &Config) -> Result<()> {
    banner("MVS UNIQUE IDS FOUND IN RIM ANALYSIS");

    let mvs = load_table("MVS file", &config.inputs.mvs_appended)?;
    let loader_create = load_table("RO Loader Create file", &config.inputs.loader_create)?;
    let loader_update = load_table("RO Loader Update file", &config.inputs.loader_update)?;
    let rim = load_table("RIM file", &config.inputs.rim_objectives)?;
    let products = load_table("Product file", &config.inputs.products)?;

    let inputs = ComparisonInputs {
        mvs: &mvs,
        loader_create: &loader_create,
        loader_update: &loader_update,
        rim: &rim,
        products: &products,
    };
    let records = compare(&inputs, &config.columns)?;

    let output = config.output_path(&config.outputs.comparison);
    write_records(&output, &records, &config.export.lock_retry)?;

    let summary = ComparisonSummary::from_records(&records);
    let summary_text = report::comparison_summary(&summary);
    println!("\n{}", summary_text);

    let summary_path = config.output_path(&config.outputs.comparison_summary);
    write_text(&summary_path, &summary_text, &config.export.lock_retry)?;

    done(&[&output, &summary_path]);
    Ok(())
}

fn run_products(config: &Config, args: &ArgMatches) -> Result<()> {
    banner("PRODUCT DATA COMPARISON ANALYSIS");

    let default_input = config.output_path(&config.outputs.comparison);
    let input = match args.get_one::<String>("input") {
        Some(path) => path.clone(),
        None => default_input.to_string_lossy().to_string(),
    };

    let mut table = load_table("Comparison file", &input)?;
    let tally = apply_product_match(&mut table, "MVS_Molecule", "RIM_Product_Name")?;

    let output = config.output_path(&config.outputs.product_comparison);
    write_table(&output, &table, &config.export.lock_retry)?;

    println!("   SUCCESS: Exported {} records", tally.total());
    print!("{}", report::product_tally_lines(&tally));

    done(&[&output]);
    Ok(())
}

fn run_loaders(config: &Config) -> Result<()> {
    banner("RO LOADERS TO RIM RO COMPARISON ANALYSIS");
    let window = config.window()?;

    let loader_create = load_table("RO Loader Create file", &config.inputs.loader_create)?;
    let loader_update = load_table("RO Loader Update file", &config.inputs.loader_update)?;
    let rim = load_table("RIM file", &config.inputs.rim_migration_extract)?;

    let comparison = compare_loaders(&loader_create, &loader_update, &rim, &config.columns, &window)?;
    println!(
        "\n{}",
        report::loader_summary(
            &comparison,
            &config.migration_window.start,
            &config.migration_window.end
        )
    );

    let output = config.output_path(&config.outputs.loader_comparison);
    write_records(&output, &[comparison], &config.export.lock_retry)?;

    done(&[&output]);
    Ok(())
}

fn run_joins(config: &Config) -> Result<()> {
    banner("RIM JOINS ANALYSIS");
    let window = config.window()?;
    println!(
        "Migration date range: {} to {}",
        config.migration_window.start, config.migration_window.end
    );

    let rim = load_table("RIM file", &config.inputs.rim_migration_extract)?;
    let registrations = load_table("Registration join file", &config.inputs.registration_joins)?;
    let drug_products = load_table("Drug product join file", &config.inputs.drug_product_joins)?;

    let analysis = analyse_joins(&rim, &registrations, &drug_products, &config.columns, &window)?;

    let created_output = config.output_path(&config.outputs.created_joins);
    if analysis.created.is_empty() {
        println!("   No created RO data to export");
    } else {
        write_records(&created_output, &analysis.created, &config.export.lock_retry)?;
        println!("   ✅ Exported {} created RO records", analysis.created.len());
    }

    let updated_output = config.output_path(&config.outputs.updated_joins);
    if analysis.updated.is_empty() {
        println!("   No updated RO data to export");
    } else {
        write_records(&updated_output, &analysis.updated, &config.export.lock_retry)?;
        println!("   ✅ Exported {} updated RO records", analysis.updated.len());
    }

    done(&[&created_output, &updated_output]);
    Ok(())
}

fn run_loader_registrations(config: &Config) -> Result<()> {
    banner("RO LOADER WITH REGISTRATION INFO");

    let loader = load_table("RO Loader Create file", &config.inputs.loader_create)?;
    let links = load_table("Registration link file", &config.inputs.loader_registration_links)?;
    let registrations = load_table("Registration file", &config.inputs.registrations)?;

    let (enriched, counts) = enrich_loader(&loader, &links, &registrations, &config.columns)?;

    let output = config.output_path(&config.outputs.loader_with_registrations);
    write_table(&output, &enriched, &config.export.lock_retry)?;

    println!("   Original records: {}", counts.original_rows);
    println!("   Final records: {}", counts.final_rows);
    println!("   Records with registration info: {}", counts.with_registration);

    done(&[&output]);
    Ok(())
}
