pub mod approval;
pub mod coverage;
pub mod directory;
pub mod error;
pub mod export;
pub mod leave;
pub mod letter;
pub mod notify;
pub mod service;
pub mod utils;
