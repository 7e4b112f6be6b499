use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use survivor::{
    AgentConfig, AgentPaths, LlmProvider, LlmSettings, RuntimeFile, Status, SurvivalAgent,
    TickOutcome, DEFAULT_STATE_DIR,
};

mod inspect;

use inspect::{run_memory, run_parse, run_prompt};

#[derive(Parser)]
#[command(
    name = "survivor",
    version,
    about = "Polling survival agent: reads the exported game state, writes one action per tick",
    long_about = None
)]
pub struct Cli {
    /// Directory shared with the game mod (state in, actions out)
    #[arg(long, global = true, env = "SURVIVOR_STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the polling loop
    Run {
        #[command(flatten)]
        agent: AgentArgs,
        /// Number of ticks to run (omit for continuous)
        #[arg(short = 't', long)]
        ticks: Option<u64>,
    },
    /// Run a single tick and print the outcome
    Once {
        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Print the prompt the model would receive for the current game state
    Prompt {
        /// JSON recipe/action table replacing the built-in one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Extract an action from raw model output read on stdin
    Parse,
    /// Show the newest entries of the agent's durable memory
    Memory {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
    /// Show runtime status
    Status,
    /// Ask a running loop to stop after its current tick
    Stop,
}

#[derive(Args, Clone, Debug)]
pub struct AgentArgs {
    /// Seconds between ticks
    #[arg(short = 'i', long, default_value_t = 5.0)]
    pub interval_secs: f64,
    /// How long an out-of-view entity is remembered, in seconds
    #[arg(long, default_value_t = 120)]
    pub ttl_secs: u64,
    /// Memory entries kept in the working window
    #[arg(long, default_value_t = 20)]
    pub memory_cap: usize,
    /// JSON recipe/action table replacing the built-in one
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    #[command(flatten)]
    pub llm: LlmArgs,
}

#[derive(Args, Clone, Debug)]
pub struct LlmArgs {
    /// Model server base URL
    #[arg(long, default_value = "http://localhost:11434")]
    pub llm_host: String,
    /// Model name, interpreted by the selected provider
    #[arg(long, default_value = "llama2")]
    pub llm_model: String,
    /// ollama (local /api/generate) or openai (/v1/chat/completions)
    #[arg(long, default_value_t = LlmProvider::Ollama, value_enum)]
    pub llm_provider: LlmProvider,
    /// Model timeout in ms
    #[arg(long, default_value_t = 60_000)]
    pub llm_timeout_ms: u64,
    /// API key for OpenAI-compatible providers
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,
    #[arg(long, default_value_t = 0.95)]
    pub top_p: f32,
    /// Tries per model call
    #[arg(long, default_value_t = 1)]
    pub llm_attempts: u32,
}

pub fn run() {
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.state_dir, cli.command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn dispatch(state_dir: PathBuf, command: Command) -> Result<(), String> {
    let paths = AgentPaths::new(state_dir);
    match command {
        Command::Run { agent, ticks } => run_loop(paths, agent, ticks),
        Command::Once { agent } => run_once(paths, agent),
        Command::Prompt { catalog } => run_prompt(paths, catalog),
        Command::Parse => run_parse(),
        Command::Memory { count } => run_memory(&paths, count),
        Command::Status => run_status(&paths),
        Command::Stop => run_stop(&paths),
    }
}

fn load_llm_key_from_file(state_dir: &Path) -> Option<String> {
    let data = fs::read_to_string(state_dir.join(".key")).ok()?;
    let trimmed = data.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn build_config(paths: AgentPaths, args: AgentArgs) -> Result<AgentConfig, String> {
    let interval = Duration::try_from_secs_f64(args.interval_secs)
        .map_err(|_| "interval must be a non-negative number of seconds".to_string())?;
    let api_key = args
        .llm
        .llm_api_key
        .or_else(|| load_llm_key_from_file(&paths.state_dir));

    let config = AgentConfig {
        paths,
        interval,
        world_ttl: Duration::from_secs(args.ttl_secs),
        memory_cap: args.memory_cap,
        catalog: args.catalog,
        llm: LlmSettings {
            host: args.llm.llm_host,
            model: args.llm.llm_model,
            provider: args.llm.llm_provider,
            api_key,
            timeout: Duration::from_millis(args.llm.llm_timeout_ms),
            temperature: args.llm.temperature,
            top_p: args.llm.top_p,
            attempts: args.llm.llm_attempts,
        },
        ..AgentConfig::default()
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn run_loop(paths: AgentPaths, args: AgentArgs, ticks: Option<u64>) -> Result<(), String> {
    let config = build_config(paths, args)?;
    let mut agent = SurvivalAgent::from_config(&config).map_err(|e| e.to_string())?;
    let runtime = RuntimeFile::new(config.paths.runtime());

    println!(
        "Starting agent | model={} | interval={:.1}s | state={}",
        agent.model_name(),
        config.interval.as_secs_f64(),
        config.state_dir().display()
    );
    println!("Run `survivor stop` (or Ctrl+C) to stop.");

    let ran = agent
        .run(config.interval, ticks, &runtime)
        .map_err(|e| e.to_string())?;
    println!(
        "Stopped after {} tick(s), {} model decision(s).",
        ran,
        agent.decisions()
    );
    Ok(())
}

fn run_once(paths: AgentPaths, args: AgentArgs) -> Result<(), String> {
    let config = build_config(paths, args)?;
    let mut agent = SurvivalAgent::from_config(&config).map_err(|e| e.to_string())?;
    print_outcome(&agent.decide());
    Ok(())
}

fn print_outcome(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::NoState(action) => println!("No state | {} | {}", action.action, action.reason),
        TickOutcome::Unchanged => println!("State unchanged; no decision"),
        TickOutcome::GameOver(action) => {
            println!("Game over | {} | {}", action.action, action.reason)
        }
        TickOutcome::Dead => println!("Dead; waiting for new world"),
        TickOutcome::Decided {
            action,
            via,
            world_reset,
        } => {
            if *world_reset {
                println!("World reset detected; memory cleared");
            }
            println!("Decision ({:?}) | {} | {}", via, action.action, action.reason);
        }
    }
}

fn run_status(paths: &AgentPaths) -> Result<(), String> {
    let runtime = RuntimeFile::new(paths.runtime());
    match runtime.load().map_err(|e| e.to_string())? {
        None => println!("Status: never started. Run `survivor run`."),
        Some(state) => println!(
            "Status: {:?} | decisions={} | last_action={} | message={}",
            state.status,
            state.decisions,
            state.last_action.unwrap_or_else(|| "-".into()),
            state.message.unwrap_or_else(|| "-".into())
        ),
    }
    Ok(())
}

fn run_stop(paths: &AgentPaths) -> Result<(), String> {
    let runtime = RuntimeFile::new(paths.runtime());
    if runtime.load().map_err(|e| e.to_string())?.is_none() {
        return Err("agent has never run in this state directory".into());
    }
    let updated = runtime
        .set_status(Status::Stopped, Some("stopped by user".into()))
        .map_err(|e| e.to_string())?;
    println!("Stop requested. decisions={}", updated.decisions);
    Ok(())
}
