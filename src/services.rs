pub mod status_resolver;
pub mod transition_authority;
pub mod request_store;
pub mod auth;
pub mod rbac_service;
pub mod fund_request_service;
pub mod document_service;
