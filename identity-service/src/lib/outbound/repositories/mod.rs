pub mod credential;
pub mod token;

pub use credential::PostgresCredentialRepository;
pub use token::PostgresTokenRepository;
