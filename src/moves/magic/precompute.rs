//! Offline generation of magic bitboard tables.
//!
//! This runs once, lazily, behind `loader::load_magic_tables`'s `OnceCell`. It is never
//! called from inside the search hot path.

use super::attacks::{bishop_attacks_per_square, rook_attacks_per_square};
use super::search::find_magic_number_for_square;
use super::structs::{BishopMagicTables, MagicEntry, MagicTables, RookMagicTables};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// How to seed the magic-number search's RNG.
pub enum MagicTableSeed {
    /// A fixed seed, for deterministic/reproducible tables (tests, `deterministic_magic`).
    Fixed(u64),
    /// Seed from OS entropy.
    FromEntropy,
}

const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// The relevant-occupancy mask for a slider on `square`, excluding the board edge in each
/// ray direction (the edge square itself can never block further, so it never needs to be
/// part of the blocker key).
fn relevant_mask(square: usize, dirs: [(i8, i8); 4]) -> u64 {
    let rank = (square / 8) as i8;
    let file = (square % 8) as i8;
    let mut mask = 0u64;

    for &(dr, df) in dirs.iter() {
        let mut r = rank + dr;
        let mut f = file + df;
        while (1..=6).contains(&r) && (1..=6).contains(&f) {
            mask |= 1u64 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }

    mask
}

/// Enumerates every subset of `mask` via the classic carry-rippler trick.
fn subsets_of(mask: u64) -> Vec<u64> {
    let mut subsets = Vec::with_capacity(1 << mask.count_ones());
    let mut subset = 0u64;
    loop {
        subsets.push(subset);
        if subset == mask {
            break;
        }
        subset = (subset.wrapping_sub(mask)) & mask;
    }
    subsets
}

fn build_magic_entry<R: rand::RngCore>(
    square: usize,
    dirs: [(i8, i8); 4],
    attack_fn: fn(usize, u64) -> u64,
    rng: &mut R,
) -> Result<MagicEntry, String> {
    let mask = relevant_mask(square, dirs);
    let shift = 64 - mask.count_ones();
    let blockers = subsets_of(mask);
    let attacks: Vec<u64> = blockers.iter().map(|&b| attack_fn(square, b)).collect();

    let magic = find_magic_number_for_square(&blockers, &attacks, shift, rng)?;

    let table_size = 1usize << mask.count_ones();
    let mut table = vec![0u64; table_size];
    for (&b, &a) in blockers.iter().zip(attacks.iter()) {
        let index = ((b.wrapping_mul(magic)) >> shift) as usize;
        table[index] = a;
    }

    Ok(MagicEntry {
        magic,
        shift,
        mask,
        table: table.into_boxed_slice(),
    })
}

pub fn generate_magic_tables(seed: MagicTableSeed) -> Result<MagicTables, String> {
    let mut rng = match seed {
        MagicTableSeed::Fixed(s) => StdRng::seed_from_u64(s),
        MagicTableSeed::FromEntropy => StdRng::from_os_rng(),
    };

    let mut rook_entries = Vec::with_capacity(64);
    let mut bishop_entries = Vec::with_capacity(64);

    for square in 0..64 {
        rook_entries.push(build_magic_entry(
            square,
            ROOK_DIRS,
            rook_attacks_per_square,
            &mut rng,
        )?);
        bishop_entries.push(build_magic_entry(
            square,
            BISHOP_DIRS,
            bishop_attacks_per_square,
            &mut rng,
        )?);
    }

    Ok(MagicTables {
        rook: RookMagicTables {
            entries: rook_entries,
        },
        bishop: BishopMagicTables {
            entries: bishop_entries,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_full_set_of_tables() {
        let tables = generate_magic_tables(MagicTableSeed::Fixed(1)).unwrap();
        assert_eq!(tables.rook.entries.len(), 64);
        assert_eq!(tables.bishop.entries.len(), 64);
    }

    #[test]
    fn lookup_matches_scan_generator_for_every_square() {
        let tables = generate_magic_tables(MagicTableSeed::Fixed(7)).unwrap();
        for square in 0..64 {
            let blockers = 0x0000_1818_0000_0000u64;
            assert_eq!(
                tables.rook.get_attacks(square, blockers),
                rook_attacks_per_square(square, blockers)
            );
            assert_eq!(
                tables.bishop.get_attacks(square, blockers),
                bishop_attacks_per_square(square, blockers)
            );
        }
    }
}
