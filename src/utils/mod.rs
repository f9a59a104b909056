pub mod datasource;
pub mod middleware;
