pub mod user_repo;
pub use user_repo::UserRepository;
pub mod rbac_repo;
pub use rbac_repo::RbacRepository;
pub mod fund_request_repo;
pub use fund_request_repo::FundRequestRepository;
