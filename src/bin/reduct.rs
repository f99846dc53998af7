use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reduct::render::render_roots;
use reduct::{Action, EngineConfig, Game, IdAllocator, LevelSet, Registry};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reduct")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Instantiate every level in a file and report problems.
    Check { levels: PathBuf },
    /// Print the starting roots of one level.
    Show {
        levels: PathBuf,
        #[arg(long, default_value_t = 0)]
        level: usize,
    },
    /// Replay a JSON list of actions against a level.
    Play {
        levels: PathBuf,
        #[arg(long, default_value_t = 0)]
        level: usize,
        #[arg(long)]
        script: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reduct=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { levels } => {
            let set = LevelSet::load(&levels)?;
            if set.is_empty() {
                bail!("No levels in {}", levels.display());
            }
            let registry = Registry::standard();
            let mut ids = IdAllocator::new();
            for index in 0..set.len() {
                let state = set
                    .instantiate(index, &registry, &mut ids)
                    .with_context(|| format!("Level {} is invalid", index))?;
                println!(
                    "Level {}: {} nodes, {} on board, {} in toolbox",
                    index,
                    state.nodes.len(),
                    state.board.len(),
                    state.toolbox.len()
                );
            }
            println!("{} levels OK", set.len());
        }

        Commands::Show { levels, level } => {
            let set = LevelSet::load(&levels)?;
            let state = set.instantiate(level, &Registry::standard(), &mut IdAllocator::new())?;
            println!("Level {}", level);
            println!("board:\n{}", render_roots(&state.nodes, &state.board)?);
            println!("toolbox:\n{}", render_roots(&state.nodes, &state.toolbox)?);
            println!("defs:\n{}", render_roots(&state.nodes, &state.defs)?);
            println!("goal:\n{}", render_roots(&state.nodes, &state.goal)?);
        }

        Commands::Play {
            levels,
            level,
            script,
            config,
        } => {
            let set = LevelSet::load(&levels)?;
            let config = match config {
                Some(path) => EngineConfig::load(&path)
                    .with_context(|| format!("Failed to load config: {}", path.display()))?,
                None => EngineConfig::default(),
            };
            let data = fs::read_to_string(&script)
                .with_context(|| format!("Failed to read script: {}", script.display()))?;
            let actions: Vec<Action> = serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse script: {}", script.display()))?;

            let mut session = Game::new(set, config).start(level)?;
            for (step, action) in actions.iter().enumerate() {
                session.dispatch(action)?;
                let present = session.present();
                println!("[{}] {} -> {:?}", step, serde_json::to_string(action)?, present.mode);
                print!("{}", render_roots(&present.nodes, &present.board)?);
                if let Some(err) = session.error() {
                    println!("  error: {}", err);
                }
                println!("  state: {}", present.nodes.fingerprint_hex());
            }
        }
    }

    Ok(())
}
