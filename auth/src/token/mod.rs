pub mod claims;
pub mod codec;
pub mod errors;

pub use claims::AccessClaims;
pub use claims::RefreshClaims;
pub use claims::TOKEN_TYPE_ACCESS;
pub use claims::TOKEN_TYPE_REFRESH;
pub use codec::IssuedAccess;
pub use codec::IssuedRefresh;
pub use codec::TokenCodec;
pub use errors::TokenError;
