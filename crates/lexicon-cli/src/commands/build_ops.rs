use std::fs;
use std::io::{self, Write};
use std::path::Path;

use lexicon_core::index::{peek_version, INDEX_FORMAT_VERSION};
use lexicon_core::settings::Settings;
use lexicon_core::store::WordSource;
use lexicon_core::{BuildEvent, FileWordSource, IndexBuilder, LexiconIndex};

pub async fn build(settings: &Settings, words_file: &str, output_file: &str) {
    let entries = die!(
        FileWordSource::new(words_file).load_words().await,
        "Error reading {words_file}: {}"
    );
    eprintln!("Building index from {} entries...", entries.len());

    let builder = IndexBuilder::new(settings.builder.clone());
    let mut handle = die!(builder.spawn(entries), "Error: {}");
    let index = loop {
        match handle.next_event().await {
            Some(BuildEvent::Progress(p)) => {
                eprint!("\r  {:>3}% ({}/{})", p.percent, p.processed, p.total);
                let _ = io::stderr().flush();
            }
            Some(BuildEvent::Finished(index)) => {
                eprintln!();
                break index;
            }
            Some(BuildEvent::Failed(e)) => {
                eprintln!();
                eprintln!("Error building index: {e}");
                std::process::exit(1);
            }
            None => {
                eprintln!("Error: build ended unexpectedly");
                std::process::exit(1);
            }
        }
    };

    die!(
        index.save(Path::new(output_file)),
        "Error writing index: {}"
    );
    let file_size = fs::metadata(output_file).map(|m| m.len()).unwrap_or(0);
    eprintln!(
        "Wrote {output_file} ({} words, {} nodes, {:.1} MB)",
        index.word_count(),
        index.node_count(),
        file_size as f64 / 1_048_576.0
    );
}

pub fn info(index_file: &str) {
    let bytes = die!(fs::read(index_file), "Error reading {index_file}: {}");
    let version = die!(peek_version(&bytes), "Error: {}");
    if version != INDEX_FORMAT_VERSION {
        eprintln!("Error: format version {version} (this build reads {INDEX_FORMAT_VERSION})");
        std::process::exit(1);
    }
    let index = die!(LexiconIndex::from_bytes(&bytes), "Error loading index: {}");

    println!("Format version: {version}");
    println!("Size: {} bytes", bytes.len());
    println!("Words: {}", index.word_count());
    println!("Trie nodes: {}", index.node_count());
    println!("Length  Words  Alphagrams");
    for len in index.lengths() {
        println!(
            "{len:>6}  {:>5}  {:>10}",
            index.words_of_length(len).len(),
            index.bucket_count(len)
        );
    }
}
