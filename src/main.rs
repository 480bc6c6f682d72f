use clap::Parser;
use log::info;
use std::error::Error;
use std::path::PathBuf;

use selfplay_zero::game::{Game, TicTacToe, UltimateTicTacToe};
use selfplay_zero::logging::setup_logging;
use selfplay_zero::mcts::SelfPlayConfig;
use selfplay_zero::training::{learn, IterationReport, UniformEvaluator};

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameKind {
    /// Plain 3x3 Tic-Tac-Toe
    Ttt,
    /// Ultimate Tic-Tac-Toe (9x9)
    Ultimate,
}

#[derive(Parser, Debug)]
#[command(name = "selfplay_zero")]
#[command(about = "Batched MCTS self-play generating symmetry-augmented training data")]
struct Config {
    /// Game to play
    #[arg(long, value_enum, default_value = "ultimate")]
    game: GameKind,

    /// JSON config file; flags below override its fields
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Self-play iterations to run
    #[arg(short = 'i', long, default_value_t = 1)]
    iterations: usize,

    /// Directory receiving training sets and results.csv
    #[arg(short = 'o', long, default_value = "selfplay_data")]
    out_dir: PathBuf,

    /// History file of an earlier run to continue from (its history.jsonl)
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Episodes per worker
    #[arg(long)]
    batch_size: Option<usize>,

    /// Worker threads
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Simulations per move
    #[arg(short = 's', long)]
    num_simulations: Option<usize>,

    /// PUCT exploration constant
    #[arg(long)]
    cpuct: Option<f32>,

    /// Dirichlet concentration
    #[arg(long)]
    dirichlet_alpha: Option<f32>,

    /// Weight of the visit distribution when mixing in noise
    #[arg(long)]
    dirichlet_weight: Option<f32>,

    /// Moves sampled before switching to argmax
    #[arg(long)]
    temperature_threshold: Option<usize>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write rotated log files here instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Config {
    fn self_play_config(&self) -> selfplay_zero::Result<SelfPlayConfig> {
        let mut config = match &self.config {
            Some(path) => SelfPlayConfig::from_json_file(path)?,
            None => SelfPlayConfig::default(),
        };

        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.threads {
            config.num_threads = v;
        }
        if let Some(v) = self.num_simulations {
            config.num_simulations = v;
        }
        if let Some(v) = self.cpuct {
            config.cpuct = v;
        }
        if let Some(v) = self.dirichlet_alpha {
            config.dirichlet_alpha = v;
        }
        if let Some(v) = self.dirichlet_weight {
            config.dirichlet_weight = v;
        }
        if let Some(v) = self.temperature_threshold {
            config.temperature_threshold = v;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }
}

fn run<G: Game>(
    config: &SelfPlayConfig,
    args: &Config,
) -> selfplay_zero::Result<Vec<IterationReport>> {
    let evaluator = UniformEvaluator::new(G::ACTION_SIZE);
    learn::<G, _>(
        config,
        &evaluator,
        args.iterations,
        &args.out_dir,
        args.resume.as_deref(),
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Config::parse();
    let _logger = setup_logging(&args.log_level, args.log_dir.as_deref())?;

    let config = args.self_play_config()?;
    info!(
        "{} v{}: {:?}, {} iteration(s) into {}",
        selfplay_zero::NAME,
        selfplay_zero::VERSION,
        args.game,
        args.iterations,
        args.out_dir.display()
    );

    let reports = match args.game {
        GameKind::Ttt => run::<TicTacToe>(&config, &args)?,
        GameKind::Ultimate => run::<UltimateTicTacToe>(&config, &args)?,
    };

    let games: usize = reports.iter().map(|r| r.games).sum();
    let exported: usize = reports.iter().map(|r| r.exported_examples).sum();
    info!("done: {} games played, {} examples exported", games, exported);
    Ok(())
}
