use std::fs;
use std::path::PathBuf;

use abstract_verifier::config::{AnalysisConfig, CollectionModel};
use abstract_verifier::dot::{to_dot, DotConfig};
use abstract_verifier::loader::load_class;
use abstract_verifier::verifier::{analyze_procedure, verdict_from, ClassVerdict};
use clap::{ArgAction, Parser};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;

#[derive(Parser)]
#[command(author, version, about = "Proves absence of division by zero and out-of-bounds indexing")]
struct Cli {
    /// Fully qualified name of the class to verify
    #[arg(value_name = "CLASS")]
    class: String,

    /// Directory containing the class files
    #[arg(long, value_name = "DIR", default_value = ".")]
    classpath: PathBuf,

    /// Loop-header merge on which widening starts
    #[arg(long, value_name = "N")]
    widening_threshold: Option<usize>,

    /// Class of the bounded resource collection
    #[arg(long, value_name = "NAME")]
    collection_type: Option<String>,

    /// Method that indexes into the collection
    #[arg(long, value_name = "NAME")]
    index_method: Option<String>,

    /// Report procedures with domain failures as unsafe
    #[arg(long)]
    strict: bool,

    /// Write one annotated CFG per procedure into this directory
    #[arg(long, value_name = "DIR")]
    dot: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> AnalysisConfig {
        let defaults = CollectionModel::default();
        let collection = CollectionModel::new(
            self.collection_type.clone().unwrap_or(defaults.type_name),
            self.index_method.clone().unwrap_or(defaults.index_method),
        );
        let mut config = AnalysisConfig::default()
            .with_collection(collection)
            .with_strict_domain_errors(self.strict);
        if let Some(threshold) = self.widening_threshold {
            config = config.with_widening_threshold(threshold);
        }
        config
    }

    fn log_level(&self) -> simplelog::LevelFilter {
        match self.verbose {
            0 => simplelog::LevelFilter::Warn,
            1 => simplelog::LevelFilter::Info,
            2 => simplelog::LevelFilter::Debug,
            _ => simplelog::LevelFilter::Trace,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Verdicts go to stdout, logs to stderr.
    simplelog::TermLogger::init(
        cli.log_level(),
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let config = cli.config();
    log::info!("Loading {} from {}", cli.class, cli.classpath.display());
    let class = load_class(&cli.classpath, &cli.class)?;

    if let Some(dir) = &cli.dot {
        fs::create_dir_all(dir).wrap_err_with(|| format!("Cannot create {}", dir.display()))?;
    }

    let mut procedures = Vec::with_capacity(class.procedures.len());
    for procedure in &class.procedures {
        let (domain, analysis) = analyze_procedure(&class, procedure, &config);
        if let Some(dir) = &cli.dot {
            let path = dir.join(format!("{}.{}.dot", class.name, procedure.name));
            let dot = to_dot(procedure, &domain, &analysis.invariants, &DotConfig::default())?;
            fs::write(&path, dot).wrap_err_with(|| format!("Cannot write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        procedures.push(verdict_from(&domain, procedure, &analysis, &config));
    }

    let verdict = ClassVerdict {
        class: class.name.clone(),
        procedures,
    };
    println!("{}", verdict.division_line());
    println!("{}", verdict.bounds_line());

    Ok(())
}
