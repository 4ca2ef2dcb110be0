//! Production accessor for magic bitboard tables.
//!
//! Tables are generated once, lazily, and cached for the lifetime of the process. The
//! seed is fixed, so the tables (and every perft/search result derived from them) are
//! reproducible across runs and platforms without shipping a precomputed binary blob.

use super::precompute::{MagicTableSeed, generate_magic_tables};
use super::structs::MagicTables;
use once_cell::sync::OnceCell;

const MAGIC_SEED: u64 = 0xC0FF_EE15_B17B_17B7;

static MAGIC_TABLES: OnceCell<MagicTables> = OnceCell::new();

/// Returns the process-wide magic bitboard tables, generating them on first use.
pub fn load_magic_tables() -> MagicTables {
    MAGIC_TABLES
        .get_or_init(|| {
            generate_magic_tables(MagicTableSeed::Fixed(MAGIC_SEED))
                .expect("magic number search failed to converge")
        })
        .clone()
}
