//! Translation quality benchmark.
//!
//! Translates a fixed set of English sentences and scores each result against
//! a reference translation by normalized Levenshtein similarity. Used by the
//! `eval` subcommand.

use crate::services::TextTranslator;
use serde::Serialize;
use std::fmt::Write;
use tracing::warn;

/// One benchmark sentence with its reference translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkCase {
    pub input: &'static str,
    pub target: &'static str,
    pub expected: &'static str,
}

const fn case(input: &'static str, target: &'static str, expected: &'static str) -> BenchmarkCase {
    BenchmarkCase {
        input,
        target,
        expected,
    }
}

/// English source sentences with reference outputs.
pub const BENCHMARK_CASES: [BenchmarkCase; 12] = [
    case("Hello", "es", "Hola"),
    case("Goodbye", "fr", "Au revoir"),
    case("I love you", "de", "Ich liebe dich"),
    case(
        "Where is the nearest train station?",
        "fr",
        "Où est la gare la plus proche ?",
    ),
    case(
        "I would like to order a coffee with milk and sugar.",
        "es",
        "Me gustaría pedir un café con leche y azúcar.",
    ),
    case(
        "The weather today is quite nice, isn't it?",
        "de",
        "Das Wetter ist heute ziemlich schön, oder?",
    ),
    case(
        "Please make sure to lock the door when you leave.",
        "it",
        "Assicurati di chiudere a chiave la porta quando esci.",
    ),
    case(
        "Learning a new language takes time and practice.",
        "fr",
        "Apprendre une nouvelle langue prend du temps et de la pratique.",
    ),
    case(
        "Can you recommend a good restaurant nearby?",
        "ja",
        "近くの良いレストランをおすすめしてもらえますか？",
    ),
    case(
        "This book was far more interesting than I expected.",
        "es",
        "Este libro fue mucho más interesante de lo que esperaba.",
    ),
    case(
        "Do not forget to water the plants while I'm away.",
        "de",
        "Vergiss nicht, die Pflanzen zu gießen, während ich weg bin.",
    ),
    case(
        "Even small acts of kindness can have a big impact.",
        "it",
        "Anche piccoli atti di gentilezza possono avere un grande impatto.",
    ),
];

/// Source language of every benchmark sentence.
pub const BENCHMARK_SOURCE: &str = "en";

/// Edit distance between `a` and `b`, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    // Single rolling row of the DP table.
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            let next = (row[j + 1] + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b.len()]
}

/// `1 - distance / longer length`, in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Scored outcome of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub input: String,
    pub target: String,
    /// The engine's output, or `ERROR: ...` when the call failed.
    pub output: String,
    pub expected: String,
    pub similarity: f64,
}

/// Runs every case through `translator` sequentially.
///
/// A failing call does not stop the run; it is scored against its error text.
pub async fn run_benchmark(
    translator: &dyn TextTranslator,
    cases: &[BenchmarkCase],
) -> Vec<BenchmarkResult> {
    let mut results = Vec::with_capacity(cases.len());

    for case in cases {
        let output = match translator
            .translate(case.input, BENCHMARK_SOURCE, case.target)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!("Benchmark case {:?} failed: {}", case.input, e);
                format!("ERROR: {}", e)
            }
        };

        results.push(BenchmarkResult {
            input: case.input.to_string(),
            target: case.target.to_string(),
            similarity: similarity(&output, case.expected),
            output,
            expected: case.expected.to_string(),
        });
    }

    results
}

/// Renders results as a markdown table followed by the mean similarity.
pub fn report(results: &[BenchmarkResult]) -> String {
    let mut out = String::new();
    out.push_str("| Input | Target Lang | Output | Reference | Similarity |\n");
    out.push_str("|-------|-------------|--------|-----------|------------|\n");

    for r in results {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {:.2}% |",
            r.input,
            r.target,
            r.output,
            r.expected,
            r.similarity * 100.0
        );
    }

    if !results.is_empty() {
        let mean = results.iter().map(|r| r.similarity).sum::<f64>() / results.len() as f64;
        let _ = writeln!(out, "\nMean similarity: {:.2}%", mean * 100.0);
    }
    out
}
