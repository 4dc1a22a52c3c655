pub mod db;
pub mod identity;
pub mod notify;
pub mod payments;
