use clap::{Parser, Subcommand, Args};

#[derive(Parser)]
#[command(
    name = "reverie",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ", built ", env!("BUILD_TIMESTAMP"), ")"),
    about = "Autonomous AI Binary Reverse Engineering Agent"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a binary toward a goal
    Analyze(AnalyzeArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct AnalyzeArgs {
    /// Path to the binary to analyze
    #[arg(short, long)]
    pub path: String,

    /// Analysis goal, e.g. "find the password"
    #[arg(long)]
    pub prompt: String,

    /// LLM provider: groq, gemini
    #[arg(long)]
    pub provider: Option<String>,

    /// LLM model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API key (or use GROQ_API_KEY / GOOGLE_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Maximum Critique passes before stopping
    #[arg(long)]
    pub max_cycles: Option<u32>,

    /// Timeout in seconds for interactive runs of the target
    #[arg(long)]
    pub exec_timeout: Option<u64>,

    /// Write the final analysis state as JSON to this file
    #[arg(long)]
    pub state_out: Option<String>,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Path to config file
    pub config: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_args_parse() {
        let cli = Cli::try_parse_from([
            "reverie", "-vv", "analyze", "--path", "/bin/true", "--prompt", "identify", "--provider", "gemini",
            "--max-cycles", "5",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Analyze(args) = cli.command else { panic!("expected analyze") };
        assert_eq!(args.path, "/bin/true");
        assert_eq!(args.provider.as_deref(), Some("gemini"));
        assert_eq!(args.max_cycles, Some(5));
    }

    #[test]
    fn test_missing_prompt_is_usage_error() {
        assert!(Cli::try_parse_from(["reverie", "analyze", "--path", "/bin/true"]).is_err());
    }
}
