mod collect;
mod parse;

pub use collect::{Vault, load_vault};
