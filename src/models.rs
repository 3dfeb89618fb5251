pub mod approval;
pub mod auth;
pub mod fund_request;
pub mod rbac;
