//! Race pace CLI
//!
//! Runs the race-weekend pipeline stage by stage: extract, impute, encode, scale, then
//! train the rankers and regressors and predict single races.

use clap::{Parser, Subcommand};
use racepace::{Config, RaceId, Result};

#[derive(Parser)]
#[command(name = "racepace")]
#[command(about = "Race finishing order prediction from practice and qualifying data", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Extract per-season observations from timing exports
    Extract {
        /// Only extract this season
        #[arg(long)]
        season: Option<u16>,
    },
    /// Merge season extracts and fill missing values
    Impute,
    /// Encode imputed observations as numeric features
    Encode,
    /// Standard-scale continuous columns
    Scale,
    /// Train and evaluate the finishing-order rankers
    Rank,
    /// Train and evaluate the relative-finish regressors
    Regress,
    /// Predict the finishing order of one race
    Predict {
        /// Race id as YY-RR, e.g. 24-05
        #[arg(long)]
        race: RaceId,
    },
    /// Run every stage from extraction to regression
    Pipeline,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Extract { season } => commands::extract(&config, season),
        Commands::Impute => commands::impute(&config),
        Commands::Encode => commands::encode(&config),
        Commands::Scale => commands::scale(&config),
        Commands::Rank => commands::rank(&config),
        Commands::Regress => commands::regress(&config),
        Commands::Predict { race } => commands::predict(&config, race),
        Commands::Pipeline => commands::pipeline(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use racepace::data::dataset::{self, ENCODED_FILE, IMPUTED_FILE, SCALED_FILE};
    use racepace::data::extract::extract_season;
    use racepace::data::timing::SeasonTiming;
    use racepace::features::encoding::{encode as encode_rows, EncodedRow};
    use racepace::features::scaling::{StandardScaler, SCALER_FILE};
    use racepace::features::TrackCatalog;
    use racepace::impute::impute as impute_rows;
    use racepace::training::{ranking, regression, Evaluation};
    use racepace::{predict as predictor, Observation};
    use std::path::Path;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        for dir in [&config.data.raw_dir, &config.data.datasets_dir, &config.data.model_dir] {
            std::fs::create_dir_all(dir)?;
        }
        println!(
            "Created {}/, {}/ and {}/ directories",
            config.data.raw_dir, config.data.datasets_dir, config.data.model_dir
        );

        println!("\nNext steps:");
        println!("  1. Put timing exports under {}/<year>/", config.data.raw_dir);
        println!("  2. Run 'racepace pipeline' to build datasets and train models");
        println!("  3. Run 'racepace predict --race 24-05' to predict a race");

        Ok(())
    }

    pub fn extract(config: &Config, season: Option<u16>) -> Result<()> {
        let seasons = match season {
            Some(year) => vec![year],
            None => config.data.seasons.clone(),
        };
        std::fs::create_dir_all(&config.data.datasets_dir)?;

        for year in seasons {
            let dir = Path::new(&config.data.raw_dir).join(year.to_string());
            log::info!("Extracting season {} from {}", year, dir.display());
            let timing = SeasonTiming::load(&dir, year)?;
            let rows = extract_season(&timing, &config.extract);

            let out = Path::new(&config.data.datasets_dir).join(dataset::season_file_name(year));
            dataset::save(&out, &rows)?;
            println!("Season {}: {} rows -> {}", year, rows.len(), out.display());
        }
        Ok(())
    }

    pub fn impute(config: &Config) -> Result<()> {
        let rows = dataset::merge_seasons(&config.data.datasets_dir)?;
        log::info!("Merged {} season rows", rows.len());

        let (rows, report) = impute_rows(rows, &config.impute);
        report.log();

        let out = Path::new(&config.data.datasets_dir).join(IMPUTED_FILE);
        dataset::save(&out, &rows)?;
        println!("Imputed dataset: {} rows -> {}", rows.len(), out.display());
        Ok(())
    }

    pub fn encode(config: &Config) -> Result<()> {
        let input = Path::new(&config.data.datasets_dir).join(IMPUTED_FILE);
        let rows: Vec<Observation> = dataset::load(&input)?;
        log::info!("Loaded {} rows from {}", rows.len(), input.display());

        let catalog = TrackCatalog::with_overrides(&config.tracks);
        let encoded = encode_rows(&rows, &catalog)?;

        let out = Path::new(&config.data.datasets_dir).join(ENCODED_FILE);
        dataset::save(&out, &encoded.rows)?;
        println!("Encoded dataset: {} rows -> {}", encoded.rows.len(), out.display());
        if !encoded.unknown_tracks.is_empty() {
            println!("Skipped events without track metadata: {}", encoded.unknown_tracks.join(", "));
        }
        Ok(())
    }

    pub fn scale(config: &Config) -> Result<()> {
        let input = Path::new(&config.data.datasets_dir).join(ENCODED_FILE);
        let mut rows: Vec<EncodedRow> = dataset::load(&input)?;

        let scaler = StandardScaler::fit(&rows)?;
        scaler.transform(&mut rows);
        for (column, (mean, std)) in scaler.columns.iter().zip(scaler.mean.iter().zip(&scaler.std)) {
            log::debug!("{}: mean={:.4}, std={:.4}", column, mean, std);
        }

        std::fs::create_dir_all(&config.data.model_dir)?;
        let scaler_path = Path::new(&config.data.model_dir).join(SCALER_FILE);
        scaler.save(&scaler_path)?;

        let out = Path::new(&config.data.datasets_dir).join(SCALED_FILE);
        dataset::save(&out, &rows)?;
        println!("Scaled dataset: {} rows -> {}", rows.len(), out.display());
        println!("Scaler parameters -> {}", scaler_path.display());
        Ok(())
    }

    fn scaled_rows(config: &Config) -> Result<Vec<EncodedRow>> {
        let input = Path::new(&config.data.datasets_dir).join(SCALED_FILE);
        let rows = dataset::load(&input)?;
        log::info!("Loaded {} rows from {}", rows.len(), input.display());
        std::fs::create_dir_all(&config.data.model_dir)?;
        Ok(rows)
    }

    fn print_evaluations(title: &str, evaluations: &[Evaluation]) {
        println!("\n=== {} ===", title);
        for evaluation in evaluations {
            println!("{}", evaluation);
        }

        if let Some(first) = evaluations.first() {
            println!("\nCorrect positions per race:");
            print!("{:<8}", "Race");
            for evaluation in evaluations {
                print!(" {:>22}", evaluation.model);
            }
            println!();
            for (i, (race, _, drivers)) in first.per_race.iter().enumerate() {
                print!("{:<8}", race.to_string());
                for evaluation in evaluations {
                    let correct = evaluation.per_race.get(i).map(|r| r.1).unwrap_or(0);
                    print!(" {:>22}", format!("{}/{}", correct, drivers));
                }
                println!();
            }
        }
    }

    pub fn rank(config: &Config) -> Result<()> {
        let rows = scaled_rows(config)?;
        let evaluations = ranking::run(&rows, config)?;
        print_evaluations("Ranking", &evaluations);
        Ok(())
    }

    pub fn regress(config: &Config) -> Result<()> {
        let rows = scaled_rows(config)?;
        let evaluations = regression::run(&rows, config)?;
        print_evaluations("Regression", &evaluations);
        Ok(())
    }

    pub fn predict(config: &Config, race: RaceId) -> Result<()> {
        let prediction = predictor::run(config, race)?;
        println!("{}", prediction);
        Ok(())
    }

    pub fn pipeline(config: &Config) -> Result<()> {
        extract(config, None)?;
        impute(config)?;
        encode(config)?;
        scale(config)?;
        rank(config)?;
        regress(config)
    }
}
