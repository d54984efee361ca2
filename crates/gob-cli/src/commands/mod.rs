pub mod compile;
pub mod init_db;
pub mod load;
pub mod query;
pub mod serve;
