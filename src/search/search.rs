use crate::board::Board;
use crate::moves::execute::{make_move_basic, make_null_move, undo_move_basic, undo_null_move};
use crate::moves::magic::MagicTables;
use crate::moves::square_control::in_check;
use crate::moves::types::Move;
use crate::search::context::{MAX_PLY, SearchContext};
use crate::search::eval::static_eval;
use crate::search::flag::{AtomicSearchFlag, SearchFlag};
use crate::search::picker::MovePicker;
use crate::search::see::SeeExt;
use crate::search::tt::{NodeType, TranspositionTable};
use std::time::{Duration, Instant};

pub const INF: i32 = 32000;
pub const MATE_SCORE: i32 = 31000;
pub const MATE_THRESHOLD: i32 = MATE_SCORE - 1000;
const MAX_Q_SEARCH_DEPTH: usize = 64;
const DRAW_SCORE: i32 = 0;

// --- Tuning constants ---

const RFP_DEPTH_LIMIT: i32 = 9;
const RFP_MARGIN_BASE: i32 = 80;
const RFP_MARGIN_MULT: i32 = 90;

const FP_DEPTH_LIMIT: i32 = 7;
const FP_MARGIN_BASE: i32 = 100;
const FP_MARGIN_MULT: i32 = 100;
const FP_HISTORY_THRESHOLD: i32 = 512;

const LMP_DEPTH_LIMIT: i32 = 14;
const LMP_BASE_MOVES: i32 = 3;
const LMP_MOVE_MULTIPLIER: i32 = 6;

const LMR_MIN_DEPTH: i32 = 2;
const LMR_MIN_MOVES: i32 = 4;

/// How often (in nodes) the search polls the clock and the cancellation
/// flag: every 1024 nodes, per the time-check cadence.
const TIME_CHECK_MASK: u64 = 0x3FF;

/// Triangular PV table: `table[ply][i]` for `i < len[ply]` holds the best
/// line found from `ply` onward.
pub struct PvTable {
    table: Vec<Vec<Option<Move>>>,
    len: Vec<usize>,
}

impl PvTable {
    fn new() -> Self {
        Self {
            table: vec![vec![None; MAX_PLY]; MAX_PLY],
            len: vec![0; MAX_PLY],
        }
    }

    fn clear_ply(&mut self, ply: usize) {
        self.len[ply] = 0;
    }

    /// Installs `mv` as the best move at `ply` and appends the child line
    /// found at `ply + 1`, truncating at `MAX_PLY`.
    fn update(&mut self, ply: usize, mv: Move) {
        self.table[ply][0] = Some(mv);
        if ply + 1 < MAX_PLY {
            let child_len = self.len[ply + 1].min(MAX_PLY - ply - 1);
            for i in 0..child_len {
                self.table[ply][i + 1] = self.table[ply + 1][i];
            }
            self.len[ply] = (child_len + 1).min(MAX_PLY - ply);
        } else {
            self.len[ply] = 1;
        }
    }

    fn line(&self) -> Vec<Move> {
        self.table[0][..self.len[0]]
            .iter()
            .filter_map(|m| *m)
            .collect()
    }

    fn ponder_move(&self) -> Option<Move> {
        if self.len[0] > 1 { self.table[0][1] } else { None }
    }
}

pub struct TimeManager {
    start_time: Instant,
    soft: Option<Duration>,
    hard: Option<Duration>,
    pondering: bool,
    pub stop_signal: bool,
}

impl TimeManager {
    pub fn new(soft: Option<Duration>, hard: Option<Duration>, pondering: bool) -> Self {
        Self {
            start_time: Instant::now(),
            soft,
            hard,
            pondering,
            stop_signal: false,
        }
    }

    /// Polls the cancellation flag and (unless pondering) the hard deadline.
    /// Handles the `Ponder -> PonderHit` transition by resetting the clock
    /// and storing `Think`, per the driver/worker handshake.
    #[inline]
    pub fn poll(&mut self, flag: &AtomicSearchFlag) {
        if self.stop_signal {
            return;
        }
        match flag.load() {
            SearchFlag::Exit => {
                self.stop_signal = true;
                return;
            }
            SearchFlag::PonderHit => {
                self.pondering = false;
                self.start_time = Instant::now();
                flag.store(SearchFlag::Think);
            }
            _ => {}
        }
        if self.pondering {
            return;
        }
        if let Some(hard) = self.hard
            && self.start_time.elapsed() >= hard
        {
            self.stop_signal = true;
        }
    }

    fn soft_expired(&self) -> bool {
        if self.pondering {
            return false;
        }
        match self.soft {
            Some(soft) => self.start_time.elapsed() >= soft,
            None => false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

struct NodeCounter {
    nodes: u64,
    seldepth: usize,
}

#[allow(clippy::too_many_arguments)]
fn quiescence(
    board: &mut Board,
    tables: &MagicTables,
    tt: &TranspositionTable,
    flag: &AtomicSearchFlag,
    ply: usize,
    mut alpha: i32,
    beta: i32,
    counter: &mut NodeCounter,
    time: &mut TimeManager,
) -> i32 {
    counter.seldepth = counter.seldepth.max(ply);

    if ply > MAX_Q_SEARCH_DEPTH {
        return static_eval(board, tables, alpha, beta);
    }

    let stand_pat = static_eval(board, tables, alpha, beta);
    if stand_pat >= beta {
        return stand_pat;
    }
    if stand_pat > alpha {
        alpha = stand_pat;
    }

    let empty_killers = [None, None];
    let empty_history = [[0i32; 64]; 64];
    let mut picker = MovePicker::new(None, empty_killers, true);
    let mut best = stand_pat;

    while let Some(mv) = picker.next(board, tables, &empty_history) {
        counter.nodes += 1;
        if counter.nodes & TIME_CHECK_MASK == 0 {
            time.poll(flag);
        }
        if time.stop_signal {
            return best;
        }

        let captured_value = board.piece_type_at(mv.to).map(|p| p.value()).unwrap_or(0);
        let is_prom = mv.is_promotion();
        let is_ep = mv.is_en_passant();

        if !is_prom && !is_ep && stand_pat + captured_value + 200 < alpha {
            continue;
        }
        if !is_prom && !is_ep && !board.static_exchange_eval(mv, 0, tables) {
            continue;
        }

        let undo = make_move_basic(board, mv);
        let score = -quiescence(
            board,
            tables,
            tt,
            flag,
            ply + 1,
            -beta,
            -alpha,
            counter,
            time,
        );
        undo_move_basic(board, undo);

        if score > best {
            best = score;
            if score > alpha {
                alpha = score;
            }
            if score >= beta {
                return best;
            }
        }
    }
    best
}

#[allow(clippy::too_many_arguments)]
fn alpha_beta(
    board: &mut Board,
    tables: &MagicTables,
    ctx: &mut SearchContext,
    tt: &mut TranspositionTable,
    pv: &mut PvTable,
    flag: &AtomicSearchFlag,
    mut depth: i32,
    ply: usize,
    mut alpha: i32,
    beta: i32,
    counter: &mut NodeCounter,
    time: &mut TimeManager,
) -> i32 {
    pv.clear_ply(ply);
    counter.seldepth = counter.seldepth.max(ply);

    if counter.nodes & TIME_CHECK_MASK == 0 {
        time.poll(flag);
    }
    if time.stop_signal {
        return static_eval(board, tables, alpha, beta);
    }
    counter.nodes += 1;

    let is_pv = beta - alpha > 1;

    if ply > 0 {
        if board.is_repetition() || board.halfmove_clock >= 100 {
            return DRAW_SCORE;
        }
        if ply >= MAX_PLY - 1 {
            return static_eval(board, tables, alpha, beta);
        }
    }

    let hash = board.zobrist;
    let mut hash_move = None;

    if let Some(probe) = tt.probe(hash, ply as i32) {
        hash_move = probe.best_move;
        if probe.depth as i32 >= depth && ply > 0 {
            match probe.bound {
                NodeType::Exact => return probe.score,
                NodeType::Lower if probe.score >= beta => return probe.score,
                NodeType::Upper if probe.score <= alpha => return probe.score,
                _ => {}
            }
        }
    }

    let in_check_now = in_check(board, board.side_to_move, tables);
    if in_check_now && depth < MAX_PLY as i32 - 1 {
        depth += 1;
    }

    if depth <= 0 && !in_check_now {
        return quiescence(board, tables, tt, flag, ply, alpha, beta, counter, time);
    }

    let static_eval_val = if in_check_now {
        0
    } else {
        static_eval(board, tables, alpha, beta)
    };

    if depth < RFP_DEPTH_LIMIT && !in_check_now && ply > 0 && !is_pv {
        let margin = RFP_MARGIN_BASE + RFP_MARGIN_MULT * depth;
        if static_eval_val - margin >= beta {
            return beta;
        }
    }

    if depth >= 4
        && !in_check_now
        && !is_pv
        && ply > 0
        && board.has_major_pieces(board.side_to_move)
        && static_eval_val >= beta
    {
        let r = if depth > 6 { 3 } else { 2 };
        let undo = make_null_move(board);
        let score = -alpha_beta(
            board,
            tables,
            ctx,
            tt,
            pv,
            flag,
            depth - r - 1,
            ply + 1,
            -beta,
            -beta + 1,
            counter,
            time,
        );
        undo_null_move(board, undo);

        if score >= beta && !time.stop_signal && score < MATE_THRESHOLD {
            return beta;
        }
    }

    let mut picker = MovePicker::new(hash_move, ctx.killer_moves[ply], false);
    let mut best_move = None;
    let mut best_score = -INF;
    let original_alpha = alpha;
    let mut move_count = 0usize;
    let mut quiets_tried: Vec<Move> = Vec::with_capacity(32);

    let mut last_currmove_emit = Instant::now();

    while let Some(mv) = picker.next(board, tables, &ctx.history) {
        if ply == 0 && last_currmove_emit.elapsed() >= Duration::from_secs(1) {
            println!(
                "info currmove {} currmovenumber {}",
                mv.to_uci(),
                move_count + 1
            );
            last_currmove_emit = Instant::now();
        }

        if depth < FP_DEPTH_LIMIT
            && !in_check_now
            && !mv.is_capture()
            && !mv.is_promotion()
            && move_count > 0
        {
            let margin = FP_MARGIN_BASE + FP_MARGIN_MULT * depth;
            let history = ctx.history[mv.from.index() as usize][mv.to.index() as usize];
            if history < FP_HISTORY_THRESHOLD && static_eval_val + margin <= alpha {
                continue;
            }
        }

        if depth < LMP_DEPTH_LIMIT
            && !in_check_now
            && !mv.is_capture()
            && !mv.is_promotion()
            && alpha == original_alpha
        {
            let lmp_threshold = LMP_BASE_MOVES + LMP_MOVE_MULTIPLIER * depth;
            if move_count > lmp_threshold as usize {
                break;
            }
        }

        let undo = make_move_basic(board, mv);
        let mut score;

        if move_count == 0 {
            score = -alpha_beta(
                board, tables, ctx, tt, pv, flag, depth - 1, ply + 1, -beta, -alpha, counter, time,
            );
        } else {
            let mut r = 0;
            if depth > LMR_MIN_DEPTH
                && move_count > LMR_MIN_MOVES as usize
                && !mv.is_capture()
                && !mv.is_promotion()
                && !in_check_now
            {
                r = 1 + (depth / 8) + (move_count as i32 / 20);
                let history = ctx.history[mv.from.index() as usize][mv.to.index() as usize];
                if history > FP_HISTORY_THRESHOLD {
                    r -= 1;
                }
                if is_pv {
                    r -= 1;
                }
                r = r.clamp(0, depth - 2);
            }

            score = -alpha_beta(
                board,
                tables,
                ctx,
                tt,
                pv,
                flag,
                depth - 1 - r,
                ply + 1,
                -alpha - 1,
                -alpha,
                counter,
                time,
            );

            if score > alpha && r > 0 {
                score = -alpha_beta(
                    board, tables, ctx, tt, pv, flag, depth - 1, ply + 1, -alpha - 1, -alpha,
                    counter, time,
                );
            }
            if score > alpha && score < beta {
                score = -alpha_beta(
                    board, tables, ctx, tt, pv, flag, depth - 1, ply + 1, -beta, -alpha, counter,
                    time,
                );
            }
        }

        undo_move_basic(board, undo);

        if !mv.is_capture() && !mv.is_promotion() {
            quiets_tried.push(mv);
        }
        move_count += 1;

        if time.stop_signal {
            return best_score.max(-INF);
        }

        if score > best_score {
            best_score = score;
            if score > alpha {
                alpha = score;
                best_move = Some(mv);
                pv.update(ply, mv);
            }
            if score >= beta {
                tt.save(hash, Some(mv), beta, depth as u8, NodeType::Lower, ply as i32);

                if !mv.is_capture() && !mv.is_promotion() {
                    ctx.update_killer(ply, mv);
                    let second_killer = ctx.killer_moves[ply][1];
                    quiets_tried.pop(); // the cutoff move itself, scored separately
                    ctx.update_history(mv, depth, &quiets_tried, hash_move, second_killer);
                }
                return beta;
            }
        }
    }

    if move_count == 0 {
        if in_check_now {
            return -MATE_SCORE + ply as i32;
        }
        return 0;
    }

    if time.stop_signal {
        return best_score;
    }

    let node_type = if best_score >= beta {
        NodeType::Lower
    } else if best_score > original_alpha {
        NodeType::Exact
    } else {
        NodeType::Upper
    };
    tt.save(hash, best_move, best_score, depth as u8, node_type, ply as i32);

    best_score
}

fn format_score(score: i32) -> String {
    if score.abs() >= MATE_THRESHOLD {
        let moves_to_mate = (MATE_SCORE - score.abs() + 1) / 2;
        if score > 0 {
            format!("mate {}", moves_to_mate)
        } else {
            format!("mate -{}", moves_to_mate)
        }
    } else {
        format!("cp {}", score)
    }
}

/// Runs iterative deepening to `max_depth`, printing `info` lines as each
/// depth completes, then — if the search was started pondering — busy-waits
/// for `PonderHit` or `Exit` before returning. Returns the best score and
/// move found at the last fully-completed depth.
#[allow(clippy::too_many_arguments)]
pub fn start_search(
    board: &mut Board,
    tables: &MagicTables,
    ctx: &mut SearchContext,
    tt: &mut TranspositionTable,
    flag: &AtomicSearchFlag,
    max_depth: i32,
    soft: Option<Duration>,
    hard: Option<Duration>,
    pondering: bool,
) -> (i32, Option<Move>, Option<Move>) {
    let mut last_best_move = None;
    let mut last_ponder_move = None;
    let mut last_best_score = 0;
    let mut counter = NodeCounter {
        nodes: 0,
        seldepth: 0,
    };
    let mut time = TimeManager::new(soft, hard, pondering);
    let overall_start = Instant::now();
    let mut pv = PvTable::new();
    let mut last_iter_duration = Duration::from_millis(0);

    let max_depth = max_depth.min(MAX_PLY as i32 - 1);

    for depth in 1..=max_depth {
        let iter_start = Instant::now();

        if depth > 1
            && !pondering
            && let Some(limit) = hard
        {
            let predicted_next = last_iter_duration * 3;
            if overall_start.elapsed() + predicted_next > limit {
                break;
            }
        }

        ctx.decay();

        let mut alpha = -INF;
        let mut beta = INF;
        let window = 50;
        if depth > 4 {
            alpha = last_best_score - window;
            beta = last_best_score + window;
        }

        let mut score;
        loop {
            score = alpha_beta(
                board, tables, ctx, tt, &mut pv, flag, depth, 0, alpha, beta, &mut counter,
                &mut time,
            );

            if time.stop_signal {
                break;
            }
            if score <= alpha {
                alpha = -INF;
                continue;
            }
            if score >= beta {
                beta = INF;
                continue;
            }
            break;
        }

        last_iter_duration = iter_start.elapsed();

        if time.stop_signal && depth > 1 {
            break;
        }

        last_best_score = score;
        last_best_move = pv.line().first().copied();
        last_ponder_move = pv.ponder_move();

        if let Some(mv) = last_best_move {
            let elapsed_ms = overall_start.elapsed().as_millis().max(1) as u64;
            let nps = counter.nodes * 1000 / elapsed_ms;
            let pv_str = pv
                .line()
                .iter()
                .map(|m| m.to_uci())
                .collect::<Vec<_>>()
                .join(" ");
            println!(
                "info depth {} seldepth {} score {} time {} nodes {} nps {} hashfull {} pv {}",
                depth,
                counter.seldepth,
                format_score(last_best_score),
                elapsed_ms,
                counter.nodes,
                nps,
                tt.hashfull(),
                if pv_str.is_empty() { mv.to_uci() } else { pv_str },
            );
        }

        if time.stop_signal {
            break;
        }
        if time.soft_expired() {
            break;
        }
        if last_best_score.abs() >= MATE_THRESHOLD {
            break;
        }
    }

    // Ponder suspension point: the worker never blocks except here.
    while flag.load() == SearchFlag::Ponder {
        std::thread::yield_now();
    }

    (last_best_score, last_best_move, last_ponder_move)
}

pub fn hashfull(tt: &TranspositionTable) -> u32 {
    tt.hashfull()
}
