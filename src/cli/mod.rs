use clap::{Parser, Subcommand};

/// Categorize short text memories with an LLM
///
/// The provider is picked from the environment: the first of
/// DEEPSEEK_API_KEY, MINIMAX_API_KEY, ZHIPU_API_KEY, DASHSCOPE_API_KEY and
/// OPENAI_API_KEY that is set wins; otherwise a local Ollama is used when
/// LLM_PROVIDER=ollama or OLLAMA_HOST is set.
#[derive(Parser, Debug)]
#[command(name = "memcat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assign categories to a memory
    Categorize {
        /// Memory text (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Print `{"categories": [...]}` instead of one category per line
        #[arg(long)]
        json: bool,
    },

    /// List known providers and show which one the environment selects
    Providers,

    /// Print the environment variables that select a provider
    Env {
        /// Provider name (deepseek, minimax, zhipu, qwen, openai, ollama)
        provider: String,

        /// API key to include
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Verify that the selected provider accepts its credential
    Check,
}
