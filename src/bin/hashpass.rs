//! Prints an Argon2 PHC string for `ADMIN_PASSWORD_HASH`.
//!
//! Usage: `cargo run --bin hashpass -- <password>`

use argon2::{Argon2, PasswordHasher};
use argon2::password_hash::{SaltString, rand_core::OsRng};

fn main() -> anyhow::Result<()> {
    let Some(password) = std::env::args().nth(1) else {
        anyhow::bail!("Usage: hashpass <password>");
    };
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }

    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hashing failed: {e}"))?
        .to_string();
    println!("ADMIN_PASSWORD_HASH={phc}");
    Ok(())
}
