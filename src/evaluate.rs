//! Batch evaluation of answer quality.
//!
//! Runs the full retrieve → assemble → answer flow over a file of test
//! questions and scores each answer with reference-free and
//! reference-based lexical metrics:
//!
//! - `relevancy` — cosine similarity between question and answer embeddings
//! - `rouge_l` — longest-common-subsequence F1 against the retrieved context
//! - `bleu` — clipped n-gram precision (up to 4-grams) with brevity penalty
//! - `token_f1` — normalized token-overlap F1 against the retrieved context
//!
//! The reference text for the lexical metrics is the retrieved context
//! itself (joined, capped at 1000 characters), so a high score means the
//! answer stayed close to its sources. Results land in a JSON report with
//! per-question scores and per-metric aggregates.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::answer::{answer_question, AnswerClient, OpenAiChat};
use crate::config::Config;
use crate::context::format_context;
use crate::embedder::{cosine_similarity, create_client, embed_query, EmbeddingClient};
use crate::index::VectorIndex;
use crate::metadata::Mission;
use crate::search;

/// Reference text is capped so one giant chunk cannot dominate recall.
const REFERENCE_CHARS: usize = 1000;

// ============ Question loading ============

#[derive(Debug, Clone, Deserialize)]
pub struct TestQuestion {
    pub question: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub mission: Option<String>,
}

/// Load test questions from a `.json` array or a `.txt` file with one
/// question per line (`#` comments and blank lines skipped).
pub fn load_test_questions(path: &Path) -> Result<Vec<TestQuestion>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read question file: {}", path.display()))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            let questions: Vec<TestQuestion> =
                serde_json::from_str(&content).context("Failed to parse question JSON")?;
            Ok(questions)
        }
        Some("txt") => Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| TestQuestion {
                question: line.to_string(),
                category: None,
                mission: None,
            })
            .collect()),
        _ => bail!(
            "Unsupported question file type: {} (use .json or .txt)",
            path.display()
        ),
    }
}

// ============ Report types ============

#[derive(Debug, Clone, Serialize)]
pub struct QuestionScores {
    pub relevancy: f32,
    pub rouge_l: f32,
    pub bleu: f32,
    pub token_f1: f32,
}

impl QuestionScores {
    fn as_pairs(&self) -> [(&'static str, f32); 4] {
        [
            ("relevancy", self.relevancy),
            ("rouge_l", self.rouge_l),
            ("bleu", self.bleu),
            ("token_f1", self.token_f1),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub index: usize,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub context_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<QuestionScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricAggregate {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub total_questions: usize,
    pub individual_results: Vec<QuestionResult>,
    pub aggregate_metrics: BTreeMap<String, MetricAggregate>,
}

impl EvalReport {
    pub fn successful(&self) -> usize {
        self.individual_results
            .iter()
            .filter(|r| r.error.is_none())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.individual_results.len() - self.successful()
    }
}

// ============ Evaluation loop ============

/// Evaluate every question: retrieve, answer, score. Per-question failures
/// are recorded in the result list, not fatal to the batch.
pub async fn evaluate_questions(
    config: &Config,
    index: &VectorIndex,
    embed_client: &dyn EmbeddingClient,
    answer_client: &dyn AnswerClient,
    questions: &[TestQuestion],
) -> Result<EvalReport> {
    let mut results: Vec<QuestionResult> = Vec::with_capacity(questions.len());
    let mut collected: BTreeMap<&'static str, Vec<f32>> = BTreeMap::new();

    for (i, item) in questions.iter().enumerate() {
        println!(
            "[{}/{}] Processing: {}...",
            i + 1,
            questions.len(),
            preview(&item.question, 50)
        );

        if item.question.trim().is_empty() {
            results.push(error_result(i, item, "Empty question"));
            continue;
        }

        match score_question(config, index, embed_client, answer_client, item).await {
            Ok((answer, context_count, scores)) => {
                println!("   Answer: {}...", preview(&answer, 100));
                print!("   Scores: ");
                for (name, value) in scores.as_pairs() {
                    print!("{}={:.3} ", name, value);
                }
                println!();

                for (name, value) in scores.as_pairs() {
                    collected.entry(name).or_default().push(value);
                }
                results.push(QuestionResult {
                    index: i,
                    question: item.question.clone(),
                    category: item.category.clone(),
                    mission: item.mission.clone(),
                    answer: Some(answer),
                    context_count,
                    scores: Some(scores),
                    error: None,
                });
            }
            Err(err) => {
                println!("   Error: {}", err);
                results.push(error_result(i, item, &err.to_string()));
            }
        }
    }

    let aggregate_metrics = collected
        .into_iter()
        .map(|(name, values)| (name.to_string(), aggregate(&values)))
        .collect();

    Ok(EvalReport {
        total_questions: questions.len(),
        individual_results: results,
        aggregate_metrics,
    })
}

async fn score_question(
    config: &Config,
    index: &VectorIndex,
    embed_client: &dyn EmbeddingClient,
    answer_client: &dyn AnswerClient,
    item: &TestQuestion,
) -> Result<(String, usize, QuestionScores)> {
    let mission = item
        .mission
        .as_deref()
        .and_then(Mission::parse_filter);

    let retrieved = search::retrieve(
        index,
        embed_client,
        &item.question,
        mission,
        config.retrieval.top_k,
    )
    .await?;
    let context = format_context(&retrieved, config.retrieval.max_context_chars);

    let answer = answer_question(
        answer_client,
        &config.answer,
        &item.question,
        &context,
        &[],
    )
    .await?;

    let reference: String = retrieved
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(REFERENCE_CHARS)
        .collect();

    let question_vec = embed_query(embed_client, &item.question).await?;
    let answer_vec = embed_query(embed_client, &answer).await?;

    let answer_tokens = tokenize(&normalize_text(&answer));
    let reference_tokens = tokenize(&normalize_text(&reference));

    let scores = QuestionScores {
        relevancy: cosine_similarity(&question_vec, &answer_vec),
        rouge_l: rouge_l(&answer_tokens, &reference_tokens),
        bleu: bleu(&answer_tokens, &reference_tokens),
        token_f1: token_f1(&answer_tokens, &reference_tokens),
    };

    Ok((answer, retrieved.len(), scores))
}

fn error_result(index: usize, item: &TestQuestion, reason: &str) -> QuestionResult {
    QuestionResult {
        index,
        question: item.question.clone(),
        category: item.category.clone(),
        mission: item.mission.clone(),
        answer: None,
        context_count: 0,
        scores: None,
        error: Some(reason.to_string()),
    }
}

fn aggregate(values: &[f32]) -> MetricAggregate {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0.0f32;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    MetricAggregate {
        mean: sum / values.len() as f32,
        min,
        max,
        count: values.len(),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    flat.chars().take(max_chars).collect()
}

/// CLI entry point for `apg eval`.
pub async fn run_eval(config: &Config, questions_path: &Path, output_path: &Path) -> Result<()> {
    println!("Loading test questions from {}...", questions_path.display());
    let questions = load_test_questions(questions_path)?;
    if questions.is_empty() {
        bail!("No test questions found in {}", questions_path.display());
    }
    println!("Loaded {} test questions", questions.len());

    let index = VectorIndex::open(config).await?;
    let embed_client = create_client(&config.embedding)?;
    let answer_client = OpenAiChat::new(&config.answer)?;

    let report = evaluate_questions(
        config,
        &index,
        embed_client.as_ref(),
        &answer_client,
        &questions,
    )
    .await?;

    println!();
    println!("{}", "=".repeat(60));
    println!("AGGREGATE METRICS");
    println!("{}", "=".repeat(60));
    for (name, agg) in &report.aggregate_metrics {
        println!(
            "{}: mean={:.3}, min={:.3}, max={:.3} (n={})",
            name, agg.mean, agg.min, agg.max, agg.count
        );
    }

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    println!();
    println!("Results saved to {}", output_path.display());

    println!();
    println!("{}", "=".repeat(60));
    println!("EVALUATION COMPLETE");
    println!("{}", "=".repeat(60));
    println!("Total questions: {}", report.total_questions);
    println!("Successful evaluations: {}", report.successful());
    println!("Failed evaluations: {}", report.failed());

    index.close().await;
    Ok(())
}

// ============ Lexical metrics ============

/// Lowercase and collapse whitespace before token comparison.
fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|s| s.to_string()).collect()
}

/// Token-overlap F1 between answer and reference.
fn token_f1(pred: &[String], reference: &[String]) -> f32 {
    if pred.is_empty() && reference.is_empty() {
        return 1.0;
    }
    if pred.is_empty() || reference.is_empty() {
        return 0.0;
    }

    let pred_set: HashSet<_> = pred.iter().collect();
    let ref_set: HashSet<_> = reference.iter().collect();

    let common = pred_set.intersection(&ref_set).count() as f32;
    let precision = common / pred.len() as f32;
    let recall = common / reference.len() as f32;

    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// ROUGE-L: F1 over the longest common subsequence of tokens.
fn rouge_l(pred: &[String], reference: &[String]) -> f32 {
    if pred.is_empty() && reference.is_empty() {
        return 1.0;
    }
    if pred.is_empty() || reference.is_empty() {
        return 0.0;
    }

    let lcs = lcs_length(pred, reference) as f32;
    let precision = lcs / pred.len() as f32;
    let recall = lcs / reference.len() as f32;

    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn lcs_length(a: &[String], b: &[String]) -> usize {
    let n = b.len();
    let mut dp = vec![0usize; n + 1];

    for item in a {
        let mut prev = 0;
        for j in 1..=n {
            let temp = dp[j];
            if *item == b[j - 1] {
                dp[j] = prev + 1;
            } else {
                dp[j] = dp[j].max(dp[j - 1]);
            }
            prev = temp;
        }
    }

    dp[n]
}

/// Sentence BLEU: geometric mean of clipped n-gram precisions (n up to 4,
/// bounded by the shorter text) times a brevity penalty.
fn bleu(pred: &[String], reference: &[String]) -> f32 {
    if pred.is_empty() || reference.is_empty() {
        return 0.0;
    }

    let max_n = 4.min(pred.len()).min(reference.len());
    let mut log_sum = 0.0f32;
    for n in 1..=max_n {
        let precision = ngram_precision(pred, reference, n);
        if precision == 0.0 {
            return 0.0;
        }
        log_sum += precision.ln();
    }
    let geo_mean = (log_sum / max_n as f32).exp();

    let brevity = if pred.len() < reference.len() {
        (1.0 - reference.len() as f32 / pred.len() as f32).exp()
    } else {
        1.0
    };

    geo_mean * brevity
}

fn ngram_precision(pred: &[String], reference: &[String], n: usize) -> f32 {
    let pred_counts = ngram_counts(pred, n);
    let ref_counts = ngram_counts(reference, n);

    let total: usize = pred_counts.values().sum();
    if total == 0 {
        return 0.0;
    }

    let mut clipped = 0usize;
    for (gram, count) in &pred_counts {
        clipped += (*count).min(ref_counts.get(gram).copied().unwrap_or(0));
    }
    clipped as f32 / total as f32
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for window in tokens.windows(n) {
        *counts.entry(window.join(" ")).or_insert(0) += 1;
    }
    counts
}
