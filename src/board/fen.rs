use super::fen_tables::{CHAR_TO_PC, PC_TO_CHAR};
use super::{Board, CASTLE_BK, CASTLE_BQ, CASTLE_WK, CASTLE_WQ, Color, Piece};
use crate::square::Square;

fn pc_index(piece: Piece, color: Color) -> usize {
    (color as usize) * 6 + (piece as usize)
}

impl Board {
    /// Loads a FEN string into `self`, replacing all existing state.
    pub fn set_fen(&mut self, fen: &str) -> Result<(), String> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(format!("FEN has too few fields: '{}'", fen));
        }

        let mut board = Board::new_empty();

        // 1. Piece placement
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(format!(
                "FEN piece placement must have 8 ranks, got {}",
                ranks.len()
            ));
        }
        for (rank_from_top, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_from_top as u8;
            let mut file: u8 = 0;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as u8;
                } else {
                    if file > 7 {
                        return Err(format!("FEN rank '{}' overflows the board", rank_str));
                    }
                    let (piece, color) = CHAR_TO_PC[c as usize]
                        .ok_or_else(|| format!("invalid FEN piece glyph '{}'", c))?;
                    let sq = Square::from_file_rank(file, rank);
                    let bb = board.bb(color, piece) | (1u64 << sq.index());
                    board.set_bb(color, piece, bb);
                    file += 1;
                }
            }
            if file != 8 {
                return Err(format!(
                    "FEN rank '{}' does not cover exactly 8 files",
                    rank_str
                ));
            }
        }

        // 2. Side to move
        board.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(format!("invalid side-to-move field '{}'", other)),
        };

        // 3. Castling rights
        let mut rights = 0u8;
        if fields[2] != "-" {
            for c in fields[2].chars() {
                rights |= match c {
                    'K' => CASTLE_WK,
                    'Q' => CASTLE_WQ,
                    'k' => CASTLE_BK,
                    'q' => CASTLE_BQ,
                    other => return Err(format!("invalid castling glyph '{}'", other)),
                };
            }
        }
        board.castling_rights = rights;

        // 4. En passant target
        board.en_passant = if fields[3] == "-" {
            None
        } else {
            let chars: Vec<char> = fields[3].chars().collect();
            if chars.len() != 2 {
                return Err(format!("invalid en passant square '{}'", fields[3]));
            }
            let file = (chars[0] as u8).wrapping_sub(b'a');
            let rank = (chars[1] as u8).wrapping_sub(b'1');
            if file > 7 || rank > 7 {
                return Err(format!("invalid en passant square '{}'", fields[3]));
            }
            Some(Square::from_file_rank(file, rank))
        };

        // 5/6. Halfmove clock / fullmove number (optional, default per UCI convention)
        board.halfmove_clock = fields.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
        board.fullmove_number = fields.get(5).and_then(|s| s.parse().ok()).unwrap_or(1);

        board.history.clear();
        board.refresh_zobrist();

        board.validate()?;

        *self = board;
        Ok(())
    }

    /// Serializes the current position into a FEN string.
    pub fn to_fen(&self) -> String {
        let mut out = String::with_capacity(64);

        for rank_from_top in 0..8u8 {
            let rank = 7 - rank_from_top;
            let mut empty_run = 0u8;
            for file in 0..8u8 {
                let sq = Square::from_file_rank(file, rank);
                match self.piece_at(sq) {
                    Some((color, piece)) => {
                        if empty_run > 0 {
                            out.push((b'0' + empty_run) as char);
                            empty_run = 0;
                        }
                        out.push(PC_TO_CHAR[pc_index(piece, color)]);
                    }
                    None => empty_run += 1,
                }
            }
            if empty_run > 0 {
                out.push((b'0' + empty_run) as char);
            }
            if rank_from_top != 7 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(if self.side_to_move == Color::White {
            'w'
        } else {
            'b'
        });

        out.push(' ');
        if self.castling_rights == 0 {
            out.push('-');
        } else {
            if self.has_castling(CASTLE_WK) {
                out.push('K');
            }
            if self.has_castling(CASTLE_WQ) {
                out.push('Q');
            }
            if self.has_castling(CASTLE_BK) {
                out.push('k');
            }
            if self.has_castling(CASTLE_BQ) {
                out.push('q');
            }
        }

        out.push(' ');
        match self.en_passant {
            Some(sq) => out.push_str(&sq.to_string()),
            None => out.push('-'),
        }

        out.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn start_position_round_trips() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let board = Board::from_str(fen).unwrap();
        assert_eq!(board.to_fen(), fen);
    }

    #[test]
    fn en_passant_square_round_trips() {
        let fen = "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3";
        let board = Board::from_str(fen).unwrap();
        assert_eq!(board.en_passant.unwrap().to_string(), "d6");
        assert_eq!(board.to_fen(), fen);
    }

    #[test]
    fn partial_castling_rights_parse() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w Kq - 0 1";
        let board = Board::from_str(fen).unwrap();
        assert!(board.has_castling(CASTLE_WK));
        assert!(!board.has_castling(CASTLE_WQ));
        assert!(!board.has_castling(CASTLE_BK));
        assert!(board.has_castling(CASTLE_BQ));
    }

    #[test]
    fn rejects_malformed_fen() {
        assert!(Board::from_str("not a fen").is_err());
    }

    #[test]
    fn rejects_overlapping_pieces() {
        // Two kings glyphed onto the same square via a bad rank string would
        // overflow the file counter before ever colliding, so test the more
        // direct overlap a malformed generator could produce instead: a rank
        // string claiming 9 files.
        assert!(Board::from_str("9/8/8/8/8/8/8/8 w - - 0 1").is_err());
    }
}
