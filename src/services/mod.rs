pub mod booking_code;
pub mod cleanup;
pub mod layout;
pub mod ledger;
pub mod lifecycle;
pub mod pricing;
pub mod scheduler;
