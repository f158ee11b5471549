pub mod lead;
pub mod run;
pub mod turn;
