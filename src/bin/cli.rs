use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vantage::board::{Board, Color, Piece};
use vantage::moves::execute::{generate_legal, make_move_basic};
use vantage::moves::magic::MagicTables;
use vantage::moves::magic::loader::load_magic_tables;
use vantage::moves::types::Move;
use vantage::search::context::MAX_PLY;
use vantage::search::flag::{AtomicSearchFlag, SearchFlag};
use vantage::search::search::start_search;
use vantage::search::state::SearchState;

const DEFAULT_HASH_MB: usize = 32;
const MIN_HASH_MB: usize = 2;
const MAX_HASH_MB: usize = 1024;

const DEFAULT_MOVE_OVERHEAD_MS: u64 = 300;
const MIN_MOVE_OVERHEAD_MS: u64 = 0;
const MAX_MOVE_OVERHEAD_MS: u64 = 10000;

struct Engine {
    board: Board,
    tables: Arc<MagicTables>,
    state: Arc<SearchState>,
    hash_mb: usize,
    move_overhead_ms: u64,
}

impl Engine {
    fn new() -> Self {
        Self {
            board: Board::new(),
            tables: Arc::new(load_magic_tables()),
            state: SearchState::new(DEFAULT_HASH_MB),
            hash_mb: DEFAULT_HASH_MB,
            move_overhead_ms: DEFAULT_MOVE_OVERHEAD_MS,
        }
    }

    /// Sets the flag to Exit and proceeds without joining; the previous
    /// worker, if any, is assumed to observe it within one time-check
    /// window and print its own `bestmove`.
    fn cancel_running_search(&self) {
        self.state.flag.store(SearchFlag::Exit);
    }
}

fn main() {
    let mut engine = Engine::new();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "uci" => handle_uci(&engine),
            "isready" => {
                engine.cancel_running_search();
                println!("readyok");
            }
            "ucinewgame" => {
                engine.cancel_running_search();
                engine.state.clear_tt();
                engine.board = Board::new();
            }
            "position" => handle_position(&mut engine, &parts),
            "go" => handle_go(&mut engine, &parts),
            "stop" => engine.cancel_running_search(),
            "ponderhit" => engine.state.flag.store(SearchFlag::PonderHit),
            "setoption" => handle_setoption(&mut engine, &parts),
            "board" | "d" | "display" => println!("{}", engine.board),
            "fen" => println!("{}", engine.board.to_fen()),
            "test" | "bench" => run_epd_tests("bench_arena/bk.epd", &engine.tables),
            "quit" => {
                engine.cancel_running_search();
                break;
            }
            _ => println!("info string unknown command '{}'", parts[0]),
        }
    }
}

fn handle_uci(engine: &Engine) {
    println!("id name Vantage 1.3");
    println!("id author Vaishak Menon");
    println!(
        "option name Hash type spin default {} min {} max {}",
        DEFAULT_HASH_MB, MIN_HASH_MB, MAX_HASH_MB
    );
    println!(
        "option name MoveOverhead type spin default {} min {} max {}",
        DEFAULT_MOVE_OVERHEAD_MS, MIN_MOVE_OVERHEAD_MS, MAX_MOVE_OVERHEAD_MS
    );
    println!("option name Ponder type check default true");
    println!("uciok");
}

fn handle_setoption(engine: &mut Engine, parts: &[&str]) {
    let Some(name_idx) = parts.iter().position(|&p| p == "name") else {
        println!("info string malformed setoption: missing 'name'");
        return;
    };
    let value_idx = parts.iter().position(|&p| p == "value");
    let name_end = value_idx.unwrap_or(parts.len());
    let name = parts[name_idx + 1..name_end].join(" ");
    let value = value_idx.map(|i| parts[i + 1..].join(" "));

    match name.as_str() {
        "Hash" => {
            let Some(raw) = value.and_then(|v| v.parse::<i64>().ok()) else {
                println!("info string malformed Hash value");
                return;
            };
            let clamped = raw.clamp(MIN_HASH_MB as i64, MAX_HASH_MB as i64) as usize;
            if clamped as i64 != raw {
                println!(
                    "info string Hash value {} clamped to {}",
                    raw, clamped
                );
            }
            engine.cancel_running_search();
            engine.hash_mb = clamped;
            engine.state.resize_tt(clamped);
        }
        "MoveOverhead" => {
            let Some(raw) = value.and_then(|v| v.parse::<i64>().ok()) else {
                println!("info string malformed MoveOverhead value");
                return;
            };
            let clamped = raw.clamp(MIN_MOVE_OVERHEAD_MS as i64, MAX_MOVE_OVERHEAD_MS as i64) as u64;
            if clamped as i64 != raw {
                println!(
                    "info string MoveOverhead value {} clamped to {}",
                    raw, clamped
                );
            }
            engine.move_overhead_ms = clamped;
        }
        "Ponder" => {
            // Always on from the engine's side; nothing to toggle.
        }
        other => println!("info string unknown option '{}'", other),
    }
}

fn handle_position(engine: &mut Engine, parts: &[&str]) {
    if parts.len() <= 1 {
        return;
    }

    let mut board = if parts[1] == "startpos" {
        Board::new()
    } else if parts[1] == "fen" {
        let fen_start = 2;
        let fen_end = parts
            .iter()
            .enumerate()
            .skip(fen_start)
            .find(|(_, &p)| p == "moves")
            .map(|(i, _)| i)
            .unwrap_or(parts.len());
        if fen_end <= fen_start {
            println!("info string too few FEN fields");
            return;
        }
        let fen_string = parts[fen_start..fen_end].join(" ");
        match Board::from_str(&fen_string) {
            Ok(b) => b,
            Err(e) => {
                println!("info string invalid FEN: {}", e);
                return;
            }
        }
    } else {
        println!("info string unrecognized position subcommand '{}'", parts[1]);
        return;
    };

    if let Some(moves_idx) = parts.iter().position(|&p| p == "moves") {
        for move_str in &parts[moves_idx + 1..] {
            match parse_uci_move(&board, move_str, &engine.tables) {
                Some(mv) => {
                    make_move_basic(&mut board, mv);
                }
                None => {
                    println!("info string illegal move in position command: {}", move_str);
                    break;
                }
            }
        }
    }

    engine.board = board;
}

fn parse_uci_move(board: &Board, move_str: &str, tables: &MagicTables) -> Option<Move> {
    if move_str.len() < 4 {
        return None;
    }
    let chars: Vec<char> = move_str.chars().collect();

    let from_file = (chars[0] as u8).wrapping_sub(b'a');
    let from_rank = (chars[1] as u8).wrapping_sub(b'1');
    let to_file = (chars[2] as u8).wrapping_sub(b'a');
    let to_rank = (chars[3] as u8).wrapping_sub(b'1');
    if from_file > 7 || from_rank > 7 || to_file > 7 || to_rank > 7 {
        return None;
    }
    let from_square = (from_rank * 8 + from_file) as usize;
    let to_square = (to_rank * 8 + to_file) as usize;

    let promo_piece = if move_str.len() >= 5 {
        match chars[4] {
            'q' => Some(Piece::Queen),
            'r' => Some(Piece::Rook),
            'b' => Some(Piece::Bishop),
            'n' => Some(Piece::Knight),
            _ => None,
        }
    } else {
        None
    };

    let mut moves = Vec::with_capacity(256);
    let mut scratch = Vec::with_capacity(256);
    let mut board_copy = board.clone();
    generate_legal(&mut board_copy, tables, &mut moves, &mut scratch);

    moves.into_iter().find(|mv| {
        mv.from.index() as usize == from_square
            && mv.to.index() as usize == to_square
            && mv.promotion == promo_piece
    })
}

struct TimeBudget {
    soft: Option<Duration>,
    hard: Option<Duration>,
}

/// Implements the `go` time-budget arithmetic: own time/increment/movestogo,
/// falling back to increment-only, then `movetime`, then unbounded.
fn compute_time_budget(
    ct: Option<u64>,
    ci: u64,
    movestogo: Option<u64>,
    movetime: Option<u64>,
    move_overhead_ms: u64,
) -> TimeBudget {
    if let Some(ct) = ct
        && ct > 0
    {
        let base = ct.saturating_sub(move_overhead_ms).max(1) as f64;
        let mtg = movestogo.unwrap_or(20).max(1) as f64;
        let alloc = base / mtg + (ci as f64) / 2.0;
        let soft = alloc * 0.8;
        let hard = (alloc * 1.2).min(base);
        return TimeBudget {
            soft: Some(Duration::from_millis(soft.max(0.0) as u64)),
            hard: Some(Duration::from_millis(hard.max(1.0) as u64)),
        };
    }
    if ci > 0 {
        return TimeBudget {
            soft: Some(Duration::from_millis((ci as f64 * 0.8) as u64)),
            hard: Some(Duration::from_millis((ci as f64 * 0.9) as u64)),
        };
    }
    if let Some(mt) = movetime
        && mt > 0
    {
        let base = mt.saturating_sub(move_overhead_ms).max(1) as f64;
        return TimeBudget {
            soft: Some(Duration::from_millis((base * 0.9) as u64)),
            hard: Some(Duration::from_millis(base as u64)),
        };
    }
    TimeBudget { soft: None, hard: None }
}

fn handle_go(engine: &mut Engine, parts: &[&str]) {
    let mut depth: i32 = MAX_PLY as i32 - 1;
    let mut movetime: Option<u64> = None;
    let mut wtime: Option<u64> = None;
    let mut btime: Option<u64> = None;
    let mut winc: u64 = 0;
    let mut binc: u64 = 0;
    let mut movestogo: Option<u64> = None;
    let mut mate: Option<i32> = None;
    let mut ponder = false;
    let mut infinite = false;

    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "depth" => {
                depth = parts.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(depth);
                i += 2;
            }
            "movetime" => {
                movetime = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "wtime" => {
                wtime = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "btime" => {
                btime = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "winc" => {
                winc = parts.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(0);
                i += 2;
            }
            "binc" => {
                binc = parts.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(0);
                i += 2;
            }
            "movestogo" => {
                movestogo = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "mate" => {
                mate = parts.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "ponder" => {
                ponder = true;
                i += 1;
            }
            "infinite" => {
                infinite = true;
                i += 1;
            }
            _ => i += 1,
        }
    }

    if let Some(n) = mate {
        depth = 2 * n - 1;
    }
    depth = depth.clamp(1, MAX_PLY as i32 - 1);

    let budget = if infinite {
        TimeBudget { soft: None, hard: None }
    } else {
        let (ct, ci) = match engine.board.side_to_move {
            Color::White => (wtime, winc),
            Color::Black => (btime, binc),
        };
        compute_time_budget(ct, ci, movestogo, movetime, engine.move_overhead_ms)
    };

    engine.state.new_search();
    engine
        .state
        .flag
        .store(if ponder { SearchFlag::Ponder } else { SearchFlag::Think });

    let mut board = engine.board.clone();
    let tables = Arc::clone(&engine.tables);
    let state = Arc::clone(&engine.state);

    thread::spawn(move || {
        let flag_snapshot = state.flag.load();
        let pondering = flag_snapshot == SearchFlag::Ponder;
        // SAFETY: the driver guarantees at most one worker runs at a time.
        let ctx = unsafe { state.ctx_mut() };
        let tt = unsafe { state.tt_mut() };

        let (_score, best_move, ponder_move) = start_search(
            &mut board,
            &tables,
            ctx,
            tt,
            &state.flag,
            depth,
            budget.soft,
            budget.hard,
            pondering,
        );

        match best_move {
            Some(mv) => match ponder_move {
                Some(pm) => println!("bestmove {} ponder {}", mv.to_uci(), pm.to_uci()),
                None => println!("bestmove {}", mv.to_uci()),
            },
            None => println!("bestmove 0000"),
        }

        state.flag.store(SearchFlag::Exit);
    });
}

// --- EPD test runner (development tooling, not part of the UCI surface) ---

fn run_epd_tests(path: &str, tables: &MagicTables) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => {
            println!("info string could not open EPD file '{}'", path);
            return;
        }
    };

    println!("Running tactical tests from {} (1s per position)...", path);
    let reader = BufReader::new(file);
    let mut solved = 0;
    let mut total = 0;

    for (line_idx, line_res) in reader.lines().enumerate() {
        let line = line_res.unwrap_or_default();
        if line.trim().is_empty() {
            continue;
        }
        let Some(bm_idx) = line.find(" bm ") else {
            continue;
        };
        let fen = line[..bm_idx].trim();
        let rest = &line[bm_idx + 4..];
        let move_end = rest.find(';').unwrap_or(rest.len());
        let san_move = rest[..move_end].trim();

        let mut board = match Board::from_str(fen) {
            Ok(b) => b,
            Err(_) => {
                println!("error parsing FEN on line {}", line_idx + 1);
                continue;
            }
        };

        let expected_uci = san_to_uci(&mut board, san_move, tables);

        let flag = AtomicSearchFlag::new(SearchFlag::Think);
        let mut ctx_holder = vantage::search::context::SearchContext::new();
        let mut tt_holder = vantage::search::tt::TranspositionTable::new(64);
        let (_score, best_move, _ponder) = start_search(
            &mut board,
            tables,
            &mut ctx_holder,
            &mut tt_holder,
            &flag,
            64,
            None,
            Some(Duration::from_millis(1000)),
            false,
        );

        let result_str = best_move.map(|m| m.to_uci()).unwrap_or_else(|| "none".to_string());
        let passed = expected_uci.as_deref() == Some(result_str.as_str());
        if passed {
            solved += 1;
        }
        total += 1;
        println!("Test #{}: {}", total, if passed { "PASS" } else { "FAIL" });
    }

    println!("Result: {}/{} solved", solved, total);
}

fn san_to_uci(board: &mut Board, san: &str, tables: &MagicTables) -> Option<String> {
    let mut moves = Vec::with_capacity(256);
    let mut scratch = Vec::with_capacity(256);
    generate_legal(board, tables, &mut moves, &mut scratch);

    let clean_san = san.replace(['+', '#', 'x'], "");

    if clean_san == "O-O" {
        return moves
            .iter()
            .find(|m| {
                let from = m.from.index() as i8;
                let to = m.to.index() as i8;
                (to - from).abs() == 2 && to > from
            })
            .map(|m| m.to_uci());
    }
    if clean_san == "O-O-O" {
        return moves
            .iter()
            .find(|m| {
                let from = m.from.index() as i8;
                let to = m.to.index() as i8;
                (to - from).abs() == 2 && to < from
            })
            .map(|m| m.to_uci());
    }

    if clean_san.len() < 2 {
        return None;
    }
    let target_str = &clean_san[clean_san.len() - 2..];
    let file = (target_str.chars().next()? as u8).wrapping_sub(b'a');
    let rank = (target_str.chars().nth(1)? as u8).wrapping_sub(b'1');
    if file > 7 || rank > 7 {
        return None;
    }
    let target_sq = (rank * 8 + file) as usize;

    let first_char = clean_san.chars().next()?;
    let piece_type = match first_char {
        'N' => Piece::Knight,
        'B' => Piece::Bishop,
        'R' => Piece::Rook,
        'Q' => Piece::Queen,
        'K' => Piece::King,
        _ => Piece::Pawn,
    };

    let disambig_char = if piece_type == Piece::Pawn {
        if clean_san.len() > 2 && first_char.is_lowercase() {
            Some(first_char)
        } else {
            None
        }
    } else {
        let content = &clean_san[1..clean_san.len() - 2];
        content.chars().next()
    };

    let candidates: Vec<&Move> = moves
        .iter()
        .filter(|m| {
            if m.to.index() as usize != target_sq {
                return false;
            }
            let Some((_, p)) = board.piece_at(m.from) else {
                return false;
            };
            if p != piece_type {
                return false;
            }
            if let Some(d) = disambig_char {
                let from_sq = m.from.index();
                let from_file = from_sq % 8;
                let from_rank = from_sq / 8;
                if d.is_ascii_lowercase() && from_file != (d as u8 - b'a') {
                    return false;
                }
                if d.is_ascii_digit() && from_rank != (d as u8 - b'1') {
                    return false;
                }
            }
            true
        })
        .collect();

    candidates.first().map(|m| m.to_uci())
}
