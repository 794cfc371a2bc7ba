//! CLI definition and dispatch.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, SystemTime};

use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::fixture_adapter::FixtureAdapter;
use crate::domain::aggregate::{BucketBy, TimeGranularity};
use crate::domain::config_validation::{validate_pipeline_config, validate_remote_config};
use crate::domain::error::LedgerError;
use crate::domain::fetch::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RECORDS};
use crate::domain::forecast::{ForecastConfig, ReleaseMode, WeightCurve};
use crate::domain::pipeline::{
    DEFAULT_OPEN_ITEM_LIMIT, DEFAULT_PARTNER_PATTERN, Diagnostic, LedgerPipeline, PipelineSettings,
    summarize_invoices,
};
use crate::domain::records::{EntityId, EntityScope};
use crate::domain::taxonomy::{
    CodeBand, CodeRangeClassifier, CostScope, CostTaxonomy, IntercompanyPolicy, JournalClassifier,
    NameTranslator, Taxonomy, TextHeuristic,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::remote_port::RemotePort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "ledgerlens", about = "Consolidated ledger KPIs and cash forecasts")]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

/// Where the data comes from and which entity to look at.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// Read from a JSON fixture file instead of the remote backend
    #[arg(long)]
    pub fixtures: Option<PathBuf>,
    /// Entity id; omit or 0 for all entities
    #[arg(long)]
    pub entity: Option<EntityId>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print revenue, costs, result, bank and open-item KPIs
    Kpis {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        year: Option<i32>,
        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Aggregate revenue and costs into period/entity/category totals
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        year: Option<i32>,
        /// month, quarter, year or none
        #[arg(long, default_value = "month")]
        by: String,
        #[arg(long)]
        per_entity: bool,
        #[arg(long)]
        per_category: bool,
        /// Translate category labels
        #[arg(long)]
        translate: bool,
        /// Write CSV here instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List bank and intercompany journal balances
    Balances {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        translate: bool,
    },
    /// Summarize invoices per kind
    Invoices {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Project the cash balance forward
    Forecast {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Kpis {
            source,
            year,
            as_of,
            json,
        } => run_kpis(&source, year, as_of, json),
        Command::Summary {
            source,
            year,
            by,
            per_entity,
            per_category,
            translate,
            output,
        } => run_summary(
            &source,
            year,
            &by,
            per_entity,
            per_category,
            translate,
            output.as_deref(),
        ),
        Command::Balances { source, translate } => run_balances(&source, translate),
        Command::Invoices { source, year } => run_invoices(&source, year),
        Command::Forecast {
            source,
            year,
            as_of,
            output,
            json,
        } => run_forecast(&source, year, as_of, output.as_deref(), json),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &LedgerError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

pub fn today() -> NaiveDate {
    DateTime::<Utc>::from(SystemTime::now()).date_naive()
}

fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        let kind = if d.partial { "partial" } else { "unavailable" };
        eprintln!("warning: {} {}: {}", d.source, kind, d.message);
    }
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn parse_decimal(config: &dyn ConfigPort, section: &str, key: &str, default: Decimal) -> Result<Decimal, LedgerError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<Decimal>()
            .map_err(|e| LedgerError::invalid(section, key, e.to_string())),
    }
}

fn get_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value).unwrap_or(default)
}

fn get_secs(config: &dyn ConfigPort, section: &str, key: &str, default: Duration) -> Duration {
    let value = config.get_int(section, key, default.as_secs() as i64);
    u64::try_from(value).map(Duration::from_secs).unwrap_or(default)
}

pub fn build_taxonomy(config: &dyn ConfigPort) -> Result<Taxonomy, LedgerError> {
    let mut costs = CostTaxonomy::default();
    for (prefix, label) in config.section_entries("cost_categories") {
        costs.register(&prefix, &label);
    }

    let defaults = CostScope::default();
    let cost_scope = CostScope {
        include: config
            .get_list("classification", "cost_prefixes")
            .unwrap_or(defaults.include),
        exclude: config
            .get_list("classification", "cost_excluded_prefixes")
            .unwrap_or(defaults.exclude),
    };

    let band = |key: &str, default: CodeBand| -> Result<CodeBand, LedgerError> {
        match config.get_string("intercompany", key) {
            None => Ok(default),
            Some(raw) => CodeBand::parse(&raw)
                .ok_or_else(|| LedgerError::invalid("intercompany", key, "expected a code range")),
        }
    };
    let code_defaults = CodeRangeClassifier::default();
    let codes = CodeRangeClassifier {
        receivable: band("receivable_band", code_defaults.receivable)?,
        payable: band("payable_band", code_defaults.payable)?,
    };
    let text = match config.get_list("intercompany", "markers") {
        Some(markers) => TextHeuristic::new(markers),
        None => TextHeuristic::default(),
    };
    let policy = match config.get_string("intercompany", "policy") {
        None => IntercompanyPolicy::default(),
        Some(raw) => IntercompanyPolicy::parse(&raw)
            .ok_or_else(|| LedgerError::invalid("intercompany", "policy", "expected 'any' or 'all'"))?,
    };

    let translator = match config.get_string("translations", "table") {
        None => NameTranslator::default(),
        Some(raw) => NameTranslator::parse(&raw)
            .ok_or_else(|| LedgerError::invalid("translations", "table", "expected Source:Target pairs"))?,
    };

    Ok(Taxonomy {
        costs,
        revenue_prefix: config
            .get_string("classification", "revenue_prefix")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "8".to_string()),
        cost_scope,
        journals: JournalClassifier {
            text,
            codes,
            policy,
        },
        translator,
    })
}

pub fn build_forecast_config(config: &dyn ConfigPort) -> Result<ForecastConfig, LedgerError> {
    let defaults = ForecastConfig::default();
    let release = match config
        .get_string("forecast", "release")
        .map(|s| s.trim().to_lowercase())
        .as_deref()
    {
        None | Some("aging") => ReleaseMode::AgingSchedule,
        Some("rate") => ReleaseMode::ConstantRate {
            collection_rate: parse_decimal(config, "forecast", "collection_rate", Decimal::new(25, 2))?,
            payment_rate: parse_decimal(config, "forecast", "payment_rate", Decimal::new(25, 2))?,
        },
        Some(other) => {
            return Err(LedgerError::invalid(
                "forecast",
                "release",
                format!("unknown release mode '{}'", other),
            ));
        }
    };
    let ramp = u32::try_from(config.get_int("forecast", "ramp_periods", 6)).unwrap_or(6);
    Ok(ForecastConfig {
        horizon: get_usize(config, "forecast", "horizon", defaults.horizon),
        period_days: u32::try_from(config.get_int("forecast", "period_days", defaults.period_days as i64))
            .unwrap_or(defaults.period_days),
        release,
        revenue_weight: WeightCurve::new(
            parse_decimal(config, "forecast", "revenue_start_weight", defaults.revenue_weight.start)?,
            ramp,
        ),
        cost_weight: WeightCurve::new(
            parse_decimal(config, "forecast", "cost_start_weight", defaults.cost_weight.start)?,
            ramp,
        ),
    })
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<PipelineSettings, LedgerError> {
    let defaults = PipelineSettings::default();
    let mut entities = BTreeMap::new();
    for (key, name) in config.section_entries("entities") {
        let id = key
            .parse::<EntityId>()
            .map_err(|_| LedgerError::invalid("entities", &key, "entity ids must be integers"))?;
        entities.insert(id, name);
    }
    Ok(PipelineSettings {
        ledger_ttl: get_secs(config, "cache", "ledger_ttl_secs", defaults.ledger_ttl),
        balance_ttl: get_secs(config, "cache", "balance_ttl_secs", defaults.balance_ttl),
        chunk_size: get_usize(config, "remote", "chunk_size", DEFAULT_CHUNK_SIZE),
        max_records: get_usize(config, "remote", "max_records", DEFAULT_MAX_RECORDS),
        open_item_limit: get_usize(config, "remote", "open_item_limit", DEFAULT_OPEN_ITEM_LIMIT),
        entities,
        partner_pattern: config
            .get_string("intercompany", "partner_pattern")
            .unwrap_or_else(|| DEFAULT_PARTNER_PATTERN.to_string()),
        forecast: build_forecast_config(config)?,
    })
}

#[cfg(feature = "jsonrpc")]
pub fn build_jsonrpc_config(
    config: &dyn ConfigPort,
) -> Result<crate::adapters::jsonrpc_adapter::JsonRpcConfig, LedgerError> {
    use crate::adapters::jsonrpc_adapter::{DEFAULT_TIMEOUT, JsonRpcConfig};

    let required = |key: &str| {
        config
            .get_string("remote", key)
            .ok_or_else(|| LedgerError::ConfigMissing {
                section: "remote".into(),
                key: key.into(),
            })
    };
    let uid = required("uid")?
        .trim()
        .parse::<i64>()
        .map_err(|_| LedgerError::invalid("remote", "uid", "uid must be an integer"))?;
    Ok(JsonRpcConfig {
        url: required("url")?,
        database: required("database")?,
        uid,
        api_key: required("api_key")?,
        timeout: get_secs(config, "remote", "timeout_secs", DEFAULT_TIMEOUT),
    })
}

fn fixtures_path(config: &dyn ConfigPort, override_path: Option<&Path>) -> Option<PathBuf> {
    override_path
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("remote", "fixtures").map(PathBuf::from))
}

pub fn build_remote(
    config: &dyn ConfigPort,
    fixtures: Option<&Path>,
) -> Result<Box<dyn RemotePort>, LedgerError> {
    if let Some(path) = fixtures_path(config, fixtures) {
        return Ok(Box::new(FixtureAdapter::from_file(path)?));
    }

    #[cfg(feature = "jsonrpc")]
    {
        use crate::adapters::jsonrpc_adapter::JsonRpcAdapter;
        let remote = JsonRpcAdapter::new(build_jsonrpc_config(config)?)?;
        Ok(Box::new(remote))
    }

    #[cfg(not(feature = "jsonrpc"))]
    {
        Err(LedgerError::ConfigMissing {
            section: "remote".into(),
            key: "fixtures".into(),
        })
    }
}

pub fn build_pipeline(source: &SourceArgs) -> Result<LedgerPipeline, ExitCode> {
    eprintln!("Loading config from {}", source.config.display());
    let config = load_config(&source.config)?;
    let offline = fixtures_path(&config, source.fixtures.as_deref()).is_some();

    let build = || -> Result<LedgerPipeline, LedgerError> {
        validate_remote_config(&config, offline)?;
        validate_pipeline_config(&config)?;
        let remote = build_remote(&config, source.fixtures.as_deref())?;
        let pipeline = LedgerPipeline::new(remote, build_taxonomy(&config)?, build_settings(&config)?)
            .with_progress(Box::new(|fetched: usize, expected: usize| {
                tracing::info!(fetched, expected, "fetch progress");
            }));
        Ok(pipeline)
    };
    build().map_err(|e| fail(&e))
}

fn resolve_year(year: Option<i32>, as_of: NaiveDate) -> i32 {
    year.unwrap_or_else(|| as_of.year())
}

fn entity_name(pipeline: &LedgerPipeline, id: EntityId) -> String {
    pipeline
        .settings()
        .entities
        .get(&id)
        .cloned()
        .unwrap_or_else(|| format!("entity {}", id))
}

fn run_kpis(source: &SourceArgs, year: Option<i32>, as_of: Option<NaiveDate>, json: bool) -> ExitCode {
    let pipeline = match build_pipeline(source) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let as_of = as_of.unwrap_or_else(today);
    let year = resolve_year(year, as_of);
    let scope = EntityScope::from_id(source.entity);

    eprintln!("Computing KPIs for {} ({})", year, scope);
    let kpis = pipeline.kpis(year, scope, as_of);
    report_diagnostics(&kpis.diagnostics);

    if json {
        return match serde_json::to_string_pretty(&kpis) {
            Ok(s) => {
                println!("{s}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&LedgerError::decode("kpis", e.to_string())),
        };
    }

    println!("Revenue:        {:>14}", money(kpis.total_revenue));
    println!("Costs:          {:>14}", money(kpis.total_costs));
    println!("Result:         {:>14}  ({}% margin)", money(kpis.result), kpis.margin_pct);
    println!("Bank:           {:>14}", money(kpis.total_bank));
    println!("Intercompany:   {:>14}", money(kpis.total_intercompany));
    println!("Receivables:    {:>14}", money(kpis.receivables));
    println!("Payables:       {:>14}", money(kpis.payables));
    println!("Yesterday:      {:>14}", money(kpis.daily_sales));

    if !kpis.positions.is_empty() {
        println!();
        println!("{:<28} {:>12} {:>12} {:>12} {:>12}", "Entity", "Bank", "Receivable", "Payable", "Net");
        for p in &kpis.positions {
            let flag = if p.is_negative() { "  !" } else { "" };
            println!(
                "{:<28} {:>12} {:>12} {:>12} {:>12}{}",
                p.name,
                money(p.bank),
                money(p.receivables),
                money(p.payables),
                money(p.net),
                flag
            );
        }
    }
    if !kpis.classification_gaps.is_empty() {
        let gaps: Vec<&str> = kpis.classification_gaps.iter().map(String::as_str).collect();
        eprintln!("note: unclassified cost prefixes: {}", gaps.join(", "));
    }
    ExitCode::SUCCESS
}

fn parse_bucket(by: &str, per_entity: bool, per_category: bool) -> Option<BucketBy> {
    let time = match by.trim().to_lowercase().as_str() {
        "none" => None,
        other => Some(TimeGranularity::parse(other)?),
    };
    Some(BucketBy {
        time,
        entity: per_entity,
        category: per_category,
    })
}

fn run_summary(
    source: &SourceArgs,
    year: Option<i32>,
    by: &str,
    per_entity: bool,
    per_category: bool,
    translate: bool,
    output: Option<&Path>,
) -> ExitCode {
    let Some(bucket_by) = parse_bucket(by, per_entity, per_category) else {
        eprintln!("error: --by must be month, quarter, year or none");
        return ExitCode::from(2);
    };
    let pipeline = match build_pipeline(source) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let year = resolve_year(year, today());
    let summary = pipeline.summary(year, EntityScope::from_id(source.entity), bucket_by);
    report_diagnostics(&summary.diagnostics);

    if let Some(path) = output {
        let adapter = if translate {
            CsvReportAdapter::with_translator(pipeline.taxonomy().translator.clone())
        } else {
            CsvReportAdapter::new()
        };
        return match adapter.write_summary(&summary.data, &path.to_string_lossy()) {
            Ok(()) => {
                eprintln!("Summary written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        };
    }

    for row in &summary.data {
        let category = row.category.as_deref().map(|c| {
            if translate {
                pipeline.taxonomy().translate(c)
            } else {
                c.to_string()
            }
        });
        let entity = row.entity_id.map(|id| entity_name(&pipeline, id));
        println!(
            "{:<8} {:<28} {:<28} {:>14}",
            row.period_key.as_deref().unwrap_or("-"),
            entity.as_deref().unwrap_or("-"),
            category.as_deref().unwrap_or("-"),
            money(row.total)
        );
    }
    ExitCode::SUCCESS
}

fn run_balances(source: &SourceArgs, translate: bool) -> ExitCode {
    let pipeline = match build_pipeline(source) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let balances = pipeline.bank_balances(EntityScope::from_id(source.entity));
    report_diagnostics(&balances.diagnostics);

    let label = |l: &str| {
        if translate {
            pipeline.taxonomy().translate(l)
        } else {
            l.to_string()
        }
    };
    for (kind, journals) in [("bank", &balances.data.bank), ("intercompany", &balances.data.intercompany)] {
        for j in journals.iter() {
            println!(
                "{:<13} {:<28} {:<32} {:<8} {:>14}",
                kind,
                entity_name(&pipeline, j.entity_id),
                label(&j.label),
                j.account_code,
                money(j.balance)
            );
        }
    }
    println!("Total bank:         {:>14}", money(balances.data.bank_total()));
    println!("Total intercompany: {:>14}", money(balances.data.intercompany_total()));
    ExitCode::SUCCESS
}

fn run_invoices(source: &SourceArgs, year: Option<i32>) -> ExitCode {
    let pipeline = match build_pipeline(source) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let year = resolve_year(year, today());
    let invoices = pipeline.invoices(year, EntityScope::from_id(source.entity));
    report_diagnostics(&invoices.diagnostics);
    for s in summarize_invoices(&invoices.data) {
        println!(
            "{:<12} {:>6} {:>14} {:>14}",
            s.kind.to_string(),
            s.count,
            money(s.total),
            money(s.residual)
        );
    }
    ExitCode::SUCCESS
}

fn run_forecast(
    source: &SourceArgs,
    year: Option<i32>,
    as_of: Option<NaiveDate>,
    output: Option<&Path>,
    json: bool,
) -> ExitCode {
    let pipeline = match build_pipeline(source) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let as_of = as_of.unwrap_or_else(today);
    let year = resolve_year(year, as_of);
    let run = pipeline.forecast(EntityScope::from_id(source.entity), as_of, year);
    report_diagnostics(&run.diagnostics);

    if let Some(warning) = &run.projection.warning {
        eprintln!(
            "warning: cash balance projected negative in period {} ({})",
            warning.period_index,
            money(warning.balance)
        );
    }

    if let Some(path) = output {
        return match CsvReportAdapter::new().write_forecast(&run.projection, &path.to_string_lossy()) {
            Ok(()) => {
                eprintln!("Forecast written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        };
    }

    if json {
        return match serde_json::to_string_pretty(&run) {
            Ok(s) => {
                println!("{s}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&LedgerError::decode("forecast", e.to_string())),
        };
    }

    println!("Opening balance: {:>14}", money(run.projection.opening_balance));
    println!(
        "Run-rate:        {:>14} in / {} out per period",
        money(run.run_rate.revenue),
        money(run.run_rate.cost)
    );
    println!("{:>6} {:>14} {:>14} {:>14}", "Period", "Inflow", "Outflow", "Closing");
    for p in &run.projection.points {
        println!(
            "{:>6} {:>14} {:>14} {:>14}",
            p.period_index,
            money(p.inflow),
            money(p.outflow),
            money(p.closing_balance)
        );
    }
    if let Some((period, balance)) = run.projection.minimum {
        println!("Minimum:         {:>14} (period {})", money(balance), period);
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let offline = fixtures_path(&config, None).is_some();
    let checks = || -> Result<(), LedgerError> {
        validate_remote_config(&config, offline)?;
        validate_pipeline_config(&config)?;
        let taxonomy = build_taxonomy(&config)?;
        let settings = build_settings(&config)?;
        eprintln!("  Entities:        {}", settings.entities.len());
        eprintln!("  Cost categories: {}", taxonomy.costs.entries().len());
        eprintln!("  Backend:         {}", if offline { "fixtures" } else { "json-rpc" });
        Ok(())
    };
    match checks() {
        Ok(()) => {
            eprintln!("\nConfiguration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn taxonomy_defaults_without_config() {
        let t = build_taxonomy(&config("")).unwrap();
        assert_eq!(t, Taxonomy::default());
    }

    #[test]
    fn taxonomy_reads_overrides() {
        let t = build_taxonomy(&config(
            "[cost_categories]\n52 = Onderzoekskosten\n\n[intercompany]\npolicy = all\nmarkers = rc\n\n[classification]\ncost_excluded_prefixes = 48\n",
        ))
        .unwrap();
        assert_eq!(t.classify_cost("520000"), "Onderzoekskosten");
        assert_eq!(t.journals.policy, IntercompanyPolicy::AllSignals);
        assert_eq!(t.cost_scope.exclude, vec!["48".to_string()]);
        assert!(t.cost_scope.covers("490000"));
    }

    #[test]
    fn forecast_config_rate_mode() {
        let f = build_forecast_config(&config(
            "[forecast]\nrelease = rate\ncollection_rate = 0.4\nhorizon = 8\nramp_periods = 0\n",
        ))
        .unwrap();
        assert_eq!(f.horizon, 8);
        assert_eq!(
            f.release,
            ReleaseMode::ConstantRate {
                collection_rate: dec!(0.4),
                payment_rate: dec!(0.25),
            }
        );
        assert_eq!(f.revenue_weight.at(1), Decimal::ONE);
    }

    #[test]
    fn forecast_config_rejects_bad_decimal() {
        let err = build_forecast_config(&config("[forecast]\ncost_start_weight = half\n")).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigInvalid { key, .. } if key == "cost_start_weight"));
    }

    #[test]
    fn settings_read_entities_and_ttls() {
        let s = build_settings(&config(
            "[entities]\n1 = LAB Conceptstore B.V.\n2 = LAB Shops B.V.\n\n[cache]\nledger_ttl_secs = 10\n",
        ))
        .unwrap();
        assert_eq!(s.entities.len(), 2);
        assert_eq!(s.entities[&2], "LAB Shops B.V.");
        assert_eq!(s.ledger_ttl, Duration::from_secs(10));
        assert_eq!(s.balance_ttl, Duration::from_secs(60));
    }

    #[test]
    fn bucket_parsing() {
        assert_eq!(parse_bucket("none", true, false), Some(BucketBy::by_entity()));
        assert_eq!(parse_bucket("Quarter", false, false).unwrap().time, Some(TimeGranularity::Quarter));
        assert_eq!(parse_bucket("weekly", false, false), None);
    }

    #[test]
    fn missing_fixture_file_is_io_error() {
        let cfg = config("[remote]\nfixtures = /nonexistent/fixtures.json\n");
        let err = build_remote(&cfg, None).err().unwrap();
        assert!(matches!(err, LedgerError::Io(_)));
    }
}
