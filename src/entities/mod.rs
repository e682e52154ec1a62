pub mod prelude;

pub mod staff_wallet;
pub mod tip_claim;
