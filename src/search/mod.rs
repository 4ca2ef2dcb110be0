pub mod context;
pub mod eval;
pub mod flag;
pub mod ordering;
pub mod pesto;
pub mod picker;
pub mod search;
pub mod see;
pub mod state;
pub mod tt;
