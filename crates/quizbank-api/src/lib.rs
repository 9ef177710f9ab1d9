pub mod auth;
pub mod error;
pub mod middleware;
pub mod password;
pub mod records;
pub mod storage;
pub mod token;
