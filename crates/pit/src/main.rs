//! Pit a search agent against a random baseline on Hex.
//!
//! Plays full games between an [`MctsAgent`] backed by random rollouts and a
//! uniformly random opponent, alternating seats between games, and reports
//! the agent's score. With any reasonable node budget the agent should win
//! nearly every game, which makes this a quick end-to-end sanity check.

use anyhow::{Context, Result};
use clap::Parser;
use lockstep_core::World;
use lockstep_mcts::evaluator::random_valid_action;
use lockstep_mcts::worlds::Hex;
use lockstep_mcts::{Evaluator, MctsAgent, RolloutEvaluator, SearchConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Play search-vs-random Hex matches and report the score.
#[derive(Parser)]
#[command(name = "pit")]
#[command(about = "Play search-vs-random Hex matches and report the score")]
struct Args {
    /// Hex board side length.
    #[arg(long, default_value = "5")]
    board: usize,

    /// Node budget per move, including the root.
    #[arg(short, long, default_value = "64")]
    nodes: usize,

    /// Exploration coefficient.
    #[arg(long, default_value = "2.5")]
    c_puct: f32,

    /// Number of games to play. Seats alternate between games.
    #[arg(short, long, default_value = "16")]
    games: usize,

    /// Random playouts per leaf evaluation.
    #[arg(long, default_value = "8")]
    rollouts: usize,

    /// Random seed for reproducibility.
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Play one game and return the final reward from the agent's seat.
fn play_game<E>(
    world: &Hex,
    agent: &MctsAgent<E>,
    agent_seat: usize,
    rng: &mut ChaCha8Rng,
) -> Result<f32>
where
    E: Evaluator<Hex>,
{
    let mut states = world.reset(1);
    loop {
        let obs = world.observe(&states);
        let action = if obs.seats[0] == agent_seat {
            let decision = agent
                .decide(world, states.clone(), rng)
                .context("search failed mid-game")?;
            decision.actions[0]
        } else {
            random_valid_action(obs.valid.row(0), rng)
        };
        let transition = world.step(&mut states, &[action]);
        if transition.terminal[0] {
            return Ok(transition.rewards[[0, agent_seat]]);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log);

    let config = SearchConfig {
        n_nodes: args.nodes,
        c_puct: args.c_puct,
    };
    config.validate().context("invalid search configuration")?;

    let world = Hex::new(args.board);
    let evaluator = RolloutEvaluator::new(ChaCha8Rng::seed_from_u64(args.seed), args.rollouts);
    let agent = MctsAgent::new(evaluator, config);
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed.wrapping_add(1));

    info!(
        board = args.board,
        nodes = args.nodes,
        games = args.games,
        "starting matches"
    );

    let mut wins = [0usize; 2];
    let mut played = [0usize; 2];
    let mut score = 0.0f32;
    for game in 0..args.games {
        let agent_seat = game % 2;
        let reward = play_game(&world, &agent, agent_seat, &mut rng)?;
        played[agent_seat] += 1;
        if reward > 0.0 {
            wins[agent_seat] += 1;
        }
        score += reward;
        info!(game, agent_seat, reward = f64::from(reward), "game finished");
    }

    println!(
        "agent won {}/{} as black, {}/{} as white (mean reward {:+.3})",
        wins[0],
        played[0],
        wins[1],
        played[1],
        score / args.games.max(1) as f32
    );
    Ok(())
}
