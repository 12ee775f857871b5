//! Identity: token signing, password hashing, refresh cookies and the
//! bearer extractor.

pub mod cookies;
pub mod extractor;
pub mod password;
pub mod tokens;

pub use extractor::AuthUser;
pub use tokens::{Claims, IssuedToken, TokenKind, TokenService};
