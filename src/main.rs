use std::io;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use salmon_minimax::engine::{EngineConfig, DEFAULT_DEPTH};
use salmon_minimax::perft::{divide, perft};
use salmon_minimax::position::{Position, START_FEN};
use salmon_minimax::uci::UciHandler;
use salmon_minimax::MoveGenerator;

#[derive(Parser)]
#[command(name = "salmon-minimax", version)]
#[command(about = "Fixed-depth minimax chess engine speaking UCI")]
struct Cli {
    /// Search depth in plies (1-8)
    #[arg(long, default_value_t = DEFAULT_DEPTH)]
    depth: u32,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count leaf positions to check move generation
    Perft {
        /// Plies to enumerate
        #[arg(long)]
        depth: u32,
        /// Position to start from
        #[arg(long, default_value = START_FEN)]
        fen: String,
        /// Print the count below each root move
        #[arg(long)]
        divide: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Perft { depth, fen, divide }) => run_perft(&fen, depth, divide),
        None => {
            let config = EngineConfig::with_depth(cli.depth);
            info!(depth = config.depth, "starting UCI session");
            let mut uci = UciHandler::stdio(config);
            uci.run(io::stdin().lock())
        }
    }
}

fn run_perft(fen: &str, depth: u32, split: bool) -> Result<()> {
    let board = Position::from_fen(fen).with_context(|| format!("invalid FEN '{}'", fen))?;
    let generator = MoveGenerator::new();
    let start = Instant::now();

    let nodes = if split {
        let counts = divide(&generator, &board, depth);
        for (mv, count) in &counts {
            println!("{}: {}", mv, count);
        }
        counts.iter().map(|(_, count)| count).sum::<u64>()
    } else {
        perft(&generator, &board, depth)
    };

    println!("Nodes searched: {}", nodes);
    info!(nodes, elapsed_ms = start.elapsed().as_millis() as u64, "perft finished");
    Ok(())
}
