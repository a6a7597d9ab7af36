//! # Term Rank
//!
//! Search-term rank index over dated search-frequency reports.
//!
//! Each report is one day's CSV export listing search terms with their
//! frequency rank and, in the extended view, the three most-clicked products.
//! Term Rank folds a directory of such reports into a per-term index, answers
//! queries by term pattern, rank threshold or product id, and exports the
//! matches as flat tables.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Reports    │──▶│ IndexBuilder │──▶│  TermIndex   │
//! │  *.csv      │   │ (core)       │   │ assoc / col  │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!                         ┌───────────────────┤
//!                         ▼                   ▼
//!                   ┌──────────┐        ┌───────────┐
//!                   │  Query   │──────▶ │  Flatten  │──▶ CSV / JSON
//!                   └──────────┘        └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! trk build --source ./reports --snapshot ./reports/week.index.json
//! trk query --source ./reports --by by-rank --policy loose 40
//! trk query --source ./reports --by by-product --policy exact B000XYZ --stdout
//! trk stats --source ./reports
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`sources`] | Report and snapshot discovery |
//! | [`ingest`] | CSV report reading into the core builder |
//! | [`snapshot`] | Index snapshots on disk |
//! | [`search`] | The query command |
//! | [`export`] | CSV and JSON result files |
//! | [`stats`] | Index summary |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod search;
pub mod snapshot;
pub mod sources;
pub mod stats;
