use clap::{Args, Parser, Subcommand};

use lexicon_cli::commands::query_ops::LexiconSource;
use lexicon_cli::commands::{build_ops, config_ops, query_ops};

#[derive(Parser)]
#[command(name = "lexitool", about = "Spanish word-game lexicon tool")]
struct Cli {
    /// Settings TOML (defaults to the embedded settings)
    #[arg(long, global = true)]
    settings: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct SourceArgs {
    /// Serialized index (.lxix); with --words it caches the built index
    #[arg(long)]
    index: Option<String>,
    /// Word list, one WORD or NORMALIZED;DISPLAY per line
    #[arg(long)]
    words: Option<String>,
}

impl From<SourceArgs> for LexiconSource {
    fn from(args: SourceArgs) -> Self {
        Self {
            index: args.index,
            words: args.words,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Build an index from a word list
    Build {
        /// Input word list
        words_file: String,
        /// Output index file
        output_file: String,
    },
    /// Show index statistics
    Info {
        /// Index file (.lxix)
        index_file: String,
    },
    /// Check whether a word is valid
    Search {
        #[command(flatten)]
        source: SourceArgs,
        word: String,
    },
    /// Exact anagrams of a set of letters
    Anagram {
        #[command(flatten)]
        source: SourceArgs,
        letters: String,
    },
    /// Anagrams of a rack with '?' jokers, plus one-tile extensions
    Wildcard {
        #[command(flatten)]
        source: SourceArgs,
        rack: String,
        /// Maximum jokers accepted in the rack
        #[arg(long)]
        max_wildcards: Option<u8>,
    },
    /// Shorter words playable from a rack
    Sub {
        #[command(flatten)]
        source: SourceArgs,
        rack: String,
        /// Minimum word length
        #[arg(long)]
        min_length: Option<usize>,
    },
    /// Words matching PATTERN[:N][,RACK] ('.' one letter, '*' or '-' any run)
    Pattern {
        #[command(flatten)]
        source: SourceArgs,
        query: String,
        /// Only words longer than the default maximum length
        #[arg(long)]
        longer: bool,
        /// Exact word length
        #[arg(short, long)]
        length: Option<usize>,
    },
    /// Export default settings as TOML
    SettingsExport,
    /// Validate a custom settings TOML file
    SettingsValidate {
        /// Path to the TOML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    lexicon_cli::logging::init();
    let cli = Cli::parse();
    let settings = config_ops::load_settings(cli.settings.as_deref());
    tracing::debug!(?settings, "settings loaded");

    match cli.command {
        Command::Build {
            words_file,
            output_file,
        } => build_ops::build(&settings, &words_file, &output_file).await,
        Command::Info { index_file } => build_ops::info(&index_file),
        Command::Search { source, word } => {
            query_ops::search(settings, &source.into(), &word).await
        }
        Command::Anagram { source, letters } => {
            query_ops::anagram(settings, &source.into(), &letters).await
        }
        Command::Wildcard {
            source,
            rack,
            max_wildcards,
        } => query_ops::wildcard(settings, &source.into(), &rack, max_wildcards).await,
        Command::Sub {
            source,
            rack,
            min_length,
        } => query_ops::sub(settings, &source.into(), &rack, min_length).await,
        Command::Pattern {
            source,
            query,
            longer,
            length,
        } => query_ops::pattern(settings, &source.into(), &query, longer, length).await,
        Command::SettingsExport => config_ops::settings_export(),
        Command::SettingsValidate { file } => config_ops::settings_validate(&file),
    }
}
