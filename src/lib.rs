pub mod canonical;
pub mod claims;
pub mod credential;
pub mod jwt;
pub mod keypair;
pub mod proof;
pub mod resolver;
pub mod suite;

pub use ed25519_dalek;
