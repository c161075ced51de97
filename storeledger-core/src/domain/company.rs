//! Company domain model

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Characters used in company codes. Ambiguous glyphs (0/O, 1/I) are left out
/// so codes can be read aloud or copied from paper.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;

/// A business using StoreLedger; every other record hangs off a company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub owner_id: String,
    pub company_code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Input for creating a company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCompany {
    pub owner_id: String,
    pub company_code: String,
    pub name: Option<String>,
}

/// Generate a random company code
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize user-entered code: trim and uppercase, then check the shape
pub fn normalize_code(input: &str) -> Result<String> {
    let code = input.trim().to_ascii_uppercase();
    if code.len() != CODE_LEN || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(Error::validation(format!(
            "Company code must be {} letters or digits",
            CODE_LEN
        )));
    }
    Ok(code)
}
