pub mod auth;
pub mod rbac;
pub mod finance_items;
pub mod fund_requests;
pub mod documents;
