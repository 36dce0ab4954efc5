pub mod claims;
pub mod codec;
pub mod token;

pub use claims::{IdentityClaims, USERNAME_CLAIM};
pub use codec::TokenCodec;
pub use token::{Token, TokenState, Unverified, Verified};
