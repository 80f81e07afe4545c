use humniz_lib::models::DetectorScoreSet;
use humniz_lib::services::detection::{
    aggregate_scores, heuristic_score, is_passing, perplexity_score, RemoteClassifier,
};
use humniz_lib::services::text_processor::{normalize_punctuation, split_sentences, word_count};
use humniz_lib::services::ProviderClient;
use humniz_lib::{has_flag, init_console_only_logging, load_config, parse_arg_value, read_input};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreReport {
    chars: usize,
    sentences: usize,
    heuristic: f64,
    perplexity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aggregate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    passed: Option<bool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  score_text <file|-> [--local] [--sentences <n>] [--out <json_path>]\n\nNotes:\n  - `--local` skips the remote classifier and prints only the offline detectors."
        );
        return Ok(());
    }

    init_console_only_logging(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    );

    let local_only = has_flag(&args, "--local");
    let sentences_n: usize = parse_arg_value(&args, "--sentences")
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);
    let out_path = parse_arg_value(&args, "--out");

    let text = normalize_punctuation(&read_input(&args[1])?);
    let sentences = split_sentences(&text);
    let config = load_config()?;

    println!("File: {}", args[1]);
    println!("Chars: {}", text.chars().count());
    println!("Sentences: {}", sentences.len());
    for (i, s) in sentences.iter().take(sentences_n).enumerate() {
        println!("[S{:04}] words={}  {}", i, word_count(s), preview(s, 100));
    }
    if sentences.len() > sentences_n {
        println!("... ({} more sentences)", sentences.len() - sentences_n);
    }
    println!();

    let heuristic = heuristic_score(&text);
    let perplexity = perplexity_score(&text);
    let (remote, aggregate, passed) = if local_only {
        (None, None, None)
    } else {
        let client = Arc::new(ProviderClient::from_config(&config)?);
        let classifier = RemoteClassifier::new(client, config.humanize.settings().classify_timeout);
        let remote = classifier.detect(&text).await;
        let aggregate = aggregate_scores(&DetectorScoreSet {
            remote,
            heuristic,
            perplexity,
        });
        let passed = is_passing(aggregate, config.humanize.pass_threshold);
        (Some(remote), Some(aggregate), Some(passed))
    };

    let report = ScoreReport {
        chars: text.chars().count(),
        sentences: sentences.len(),
        heuristic,
        perplexity,
        remote,
        aggregate,
        passed,
    };
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    if let Some(out) = out_path {
        std::fs::write(&out, &json)?;
        println!("Saved JSON: {}", out);
    }
    Ok(())
}
