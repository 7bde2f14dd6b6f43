//! # Apogee
//!
//! A local-first retrieval-augmented question answering system for historical
//! NASA mission documents.
//!
//! Apogee ingests flight transcripts, mission reports, and press kits from a
//! corpus directory, splits them into sentence-aligned overlapping chunks
//! tagged with mission metadata derived from file paths, embeds the chunks in
//! batches, and stores everything in a SQLite vector index. On top of that
//! index it offers semantic search, grounded question answering through a
//! chat model, and a batch evaluation harness with lexical answer metrics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐   ┌──────────┐
//! │   Scanner    │──▶│   Chunker     │──▶│  Embedder    │──▶│  SQLite   │
//! │ corpus walk │   │ split + tag  │   │ batch+retry │   │  vectors │
//! └─────────────┘   └──────────────┘   └─────────────┘   └────┬─────┘
//!                                                            │
//!                                        ┌───────────────────┤
//!                                        ▼                   ▼
//!                                  ┌──────────┐        ┌──────────┐
//!                                  │  Search   │        │   Ask     │
//!                                  │ (cosine) │        │ (OpenAI) │
//!                                  └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! apg init                          # create the vector store
//! apg sources                       # check corpus roots
//! apg ingest                        # scan, chunk, embed, index
//! apg search "oxygen tank failure"  # semantic search
//! apg ask "What happened to Apollo 13?"
//! apg eval --questions questions.json
//! apg stats                         # index overview
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scanner`] | Recursive corpus discovery |
//! | [`metadata`] | Path-derived mission/category/data-type tags |
//! | [`chunker`] | Sentence-boundary chunking with overlap |
//! | [`embedder`] | Embedding clients and the batch driver |
//! | [`index`] | SQLite vector index and reconciliation |
//! | [`ingest`] | End-to-end ingestion pipeline |
//! | [`search`] | Semantic retrieval |
//! | [`context`] | Retrieved-chunk context assembly |
//! | [`answer`] | Chat-model question answering |
//! | [`evaluate`] | Batch evaluation with lexical metrics |
//! | [`stats`] | Index statistics and corpus health |
//! | [`progress`] | Ingest progress reporting |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Ingestion error taxonomy |

pub mod answer;
pub mod chunker;
pub mod config;
pub mod context;
pub mod db;
pub mod embedder;
pub mod error;
pub mod evaluate;
pub mod index;
pub mod ingest;
pub mod metadata;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod scanner;
pub mod search;
pub mod stats;
