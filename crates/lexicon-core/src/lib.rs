pub mod alphabet;
pub mod backend;
pub mod builder;
pub mod cache;
pub mod index;
pub mod lexicon;
pub mod query;
pub mod settings;
pub mod store;

pub use alphabet::{alphagram, normalize, Alphagram, NormalizedWord};
pub use backend::{BackendError, IndexBackend, QueryBackend, Tier};
pub use builder::{BuildError, BuildEvent, BuildProgress, BuildStatus, IndexBuilder};
pub use index::{IndexError, LexiconIndex, WordEntry};
pub use lexicon::{BuildSnapshot, FastMode, TieredLexicon};
pub use query::{QueryError, WildcardMatches};
pub use settings::Settings;
pub use store::{FileIndexStore, FileWordSource, IndexStore, MemoryIndexStore, WordSource};
