#![forbid(unsafe_code)]
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use roulement::{
    audit, compile,
    io::{self, RosterTable},
    run::{execute, RunError, RunOptions, RunReport},
    BacktrackSolver, CompileOptions, CsvDirectory, DomainModel, MemorySink, Objective, Preset,
    RecordingPolicy, RosterConfig, SolveMode,
};
use std::collections::BTreeSet;
use std::time::Duration;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI de génération de tableaux de garde (sans base de données)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON de configuration
    #[arg(long, global = true, conflicts_with = "preset")]
    config: Option<String>,

    /// Configuration de référence (single-week, evening-rota, dialysis)
    #[arg(long, global = true)]
    preset: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Écrire un preset en JSON
    Init {
        #[arg(long)]
        out: String,
    },

    /// Compiler et afficher le résumé du modèle
    Compile,

    /// Lancer la recherche et exporter les solutions retenues
    Solve {
        /// Répertoire des CSV (ignoré avec --dry-run)
        #[arg(long, default_value = ".")]
        out_dir: String,
        /// Index à enregistrer, "0,2,4"
        #[arg(long, conflicts_with = "stride")]
        record: Option<String>,
        /// Enregistre une solution toutes les N
        #[arg(long)]
        stride: Option<u64>,
        /// Nombre de solutions avant arrêt
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long, value_enum, default_value_t = ModeArg::Enumerate)]
        mode: ModeArg,
        #[arg(long)]
        node_limit: Option<u64>,
        /// Secondes, 0 = sans limite
        #[arg(long, default_value_t = 60)]
        time_limit: u64,
        /// Garde les tableaux en mémoire, n'écrit rien
        #[arg(long)]
        dry_run: bool,
        /// Pas de relance sans clauses d'espacement en cas d'infaisabilité
        #[arg(long)]
        no_diagnose: bool,
    },

    /// Relire un CSV exporté et vérifier toutes les règles
    Check {
        #[arg(long)]
        csv: String,
        /// Export CSV des violations (optionnel)
        #[arg(long)]
        report: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Enumerate,
    First,
    Optimize,
}

impl From<ModeArg> for SolveMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Enumerate => SolveMode::Enumerate,
            ModeArg::First => SolveMode::FirstFeasible,
            ModeArg::Optimize => SolveMode::Optimize(Objective::MinimizeSpread),
        }
    }
}

fn load_config(config: Option<&str>, preset: Option<&str>) -> Result<RosterConfig> {
    match (config, preset) {
        (Some(path), _) => RosterConfig::load(path),
        (None, Some(name)) => {
            let preset: Preset = name.parse()?;
            Ok(preset.config())
        }
        (None, None) => bail!("either --config or --preset is required"),
    }
}

fn parse_indices(raw: &str) -> Result<BTreeSet<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .with_context(|| format!("invalid solution index: {s}"))
        })
        .collect()
}

fn print_report(report: &RunReport) {
    println!("status: {}", report.outcome.status);
    println!("phase: {}", report.final_phase());
    println!("solutions: {}", report.solutions);
    if let Some(objective) = report.outcome.objective {
        println!("spread: {objective}");
    }
    println!("recorded: {}", report.recorded.len());
    for rec in &report.recorded {
        println!("  #{} {} -> {}", rec.index, rec.name, rec.location.display());
    }
    if report.failed_exports > 0 {
        eprintln!("failed exports: {}", report.failed_exports);
    }
    let stats = report.outcome.stats;
    println!(
        "decisions: {} | failures: {} | elapsed: {} ms",
        stats.decisions,
        stats.failures,
        stats.elapsed.as_millis()
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let code = match cli.cmd {
        Commands::Init { out } => {
            let name = cli.preset.as_deref().unwrap_or("single-week");
            let preset: Preset = name.parse()?;
            preset.config().save(&out)?;
            println!("preset {preset} written to {out}");
            0
        }
        Commands::Compile => {
            let config = load_config(cli.config.as_deref(), cli.preset.as_deref())?;
            let domain = DomainModel::new(&config)?;
            let bounds = domain.bounds();
            println!(
                "nurses: {} | days: {} | sundays: {}",
                domain.nurses().len(),
                domain.calendar().len(),
                domain.calendar().sundays().len()
            );
            println!(
                "units: {} (sunday {}) | total {} | sunday {} | week ceiling {} | category cap {}",
                bounds.total_units,
                bounds.sunday_units,
                bounds.total,
                bounds.sunday,
                bounds.week_ceiling,
                bounds.category_cap
            );
            if let Some(quota) = bounds.restricted_sunday {
                println!("restricted sunday quota: {quota}");
            }
            let model = compile(&domain, CompileOptions::default())?;
            print!("{}", model.summary());
            0
        }
        Commands::Solve {
            out_dir,
            record,
            stride,
            limit,
            mode,
            node_limit,
            time_limit,
            dry_run,
            no_diagnose,
        } => {
            let mut config = load_config(cli.config.as_deref(), cli.preset.as_deref())?;
            if let Some(raw) = record {
                config.recording = RecordingPolicy::Indices(parse_indices(&raw)?);
            }
            if let Some(span) = stride {
                config.recording = RecordingPolicy::Stride(span);
            }
            if let Some(limit) = limit {
                config.solution_limit = limit;
            }

            let mut solver = BacktrackSolver::new();
            if let Some(nodes) = node_limit {
                solver = solver.with_node_limit(nodes);
            }
            if time_limit > 0 {
                solver = solver.with_time_limit(Duration::from_secs(time_limit));
            }
            let options = RunOptions {
                mode: mode.into(),
                diagnose: !no_diagnose,
            };

            let result = if dry_run {
                execute(&config, &mut solver, MemorySink::new(), options)
            } else {
                let sink = CsvDirectory::open(&out_dir)?;
                execute(&config, &mut solver, sink, options)
            };
            match result {
                Ok(report) => {
                    print_report(&report);
                    if report.solutions == 0 || report.failed_exports > 0 {
                        2
                    } else {
                        0
                    }
                }
                Err(RunError::Infeasible(err)) => {
                    eprintln!("{err}");
                    eprintln!("hint: {}", err.guidance());
                    2
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Check {
            csv: csv_path,
            report,
        } => {
            let config = load_config(cli.config.as_deref(), cli.preset.as_deref())?;
            let domain = DomainModel::new(&config)?;
            let table: RosterTable = io::import_table_csv(&csv_path)?;
            let schedule = table
                .to_schedule(&domain)
                .with_context(|| format!("resolving {csv_path}"))?;
            let violations = audit(&domain, &schedule);
            if violations.is_empty() {
                println!("OK: no violations");
                0
            } else {
                eprintln!("Found {} violation(s)", violations.len());
                for v in &violations {
                    eprintln!("  {v}");
                }
                if let Some(path) = report {
                    let mut w = csv::Writer::from_path(path)?;
                    w.write_record(["family", "detail"])?;
                    for v in &violations {
                        w.write_record([v.family().code(), v.to_string().as_str()])?;
                    }
                    w.flush()?;
                }
                // Code 2 = WARNING/INCOMPLETE
                2
            }
        }
    };

    std::process::exit(code);
}
