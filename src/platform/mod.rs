//! Watch page resolution: transport, payload, player script decoding

pub mod cipher;
pub mod client;
pub mod evaluator;
pub mod extractor;
pub mod formats;
pub mod jsjson;
pub mod player_response;
pub mod resolver;

pub use cipher::*;
pub use client::*;
pub use evaluator::*;
pub use extractor::{extract_cipher_decoder, extract_n_decoder};
pub use player_response::PlayerResponse;
pub use resolver::*;
