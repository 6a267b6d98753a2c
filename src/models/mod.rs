pub mod deposit;

pub use deposit::{ChainBlock, ChainTransaction, DepositRecord, LogMatch, ResolvedTx};
