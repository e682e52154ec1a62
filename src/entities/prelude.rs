#![allow(unused_imports)]

pub use super::staff_wallet::Entity as StaffWallet;
pub use super::tip_claim::Entity as TipClaim;
