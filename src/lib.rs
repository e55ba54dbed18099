pub mod core;
pub mod store;
pub mod util;
pub mod packed;
pub mod index;
pub mod codec;
pub mod upgrade;
pub mod logging;

pub use crate::core::config::UpgradeConfig;
pub use crate::core::error::{Error, ErrorKind, Result, UpgradeError};
pub use crate::index::generation::Generation;
pub use crate::upgrade::{IndexUpgrader, UpgradeState, detect, upgrade, upgrade_with_config};

/*
┌──────────────────────────────── INDEX UPGRADER LAYOUT ────────────────────────────────┐
│                                                                                        │
│  upgrade::IndexUpgrader   Detecting → Reading(G) → Merging(G→G+1) → Committing(G+1)    │
│          │                                                                             │
│          ├── index::detector        newest commit marker → Generation                  │
│          ├── index::deleter         ref counted file lifecycle, pending retries        │
│          ├── index::merge_policy    tiered forced merges down to one segment           │
│          └── codec::codec_for(G)    read commit / open segments / write segment        │
│                     │                                                                  │
│                     ├── index::segment_reader ── term_infos_reader ── term_index       │
│                     │                        └── postings ── skip_reader               │
│                     └── index::merger ── segment_writer ── postings_writer ── skip_w.  │
│                                                                                        │
│  packed     fixed width integer arrays (term index offsets, merge doc maps)            │
│  store      Directory (fs / ram), IndexInput / IndexOutput, codec headers              │
│  util       BitVector, PagedBytes, UTF-16 order, base 36                               │
└────────────────────────────────────────────────────────────────────────────────────────┘
*/
