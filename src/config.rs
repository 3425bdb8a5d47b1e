use std::env;
use std::fmt;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@smartclinic.com";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Clone, Debug)]
pub struct Config {
    /// When unset the server runs on the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub admin_email: String,
    pub admin_password: AdminPassword,
}

/// How the single admin password is supplied.
#[derive(Clone)]
pub enum AdminPassword {
    Plain(String),
    /// Argon2 PHC string, see `src/bin/hashpass.rs`.
    Hashed(String),
}

// Debug output of Config and AdminCredential goes through here; never print the secret.
impl fmt::Debug for AdminPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminPassword::Plain(_) => f.write_str("Plain(<redacted>)"),
            AdminPassword::Hashed(_) => f.write_str("Hashed(<redacted>)"),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);

        if session_ttl_hours <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be positive, got {session_ttl_hours}");
        }

        let admin_email =
            env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());
        let admin_password = match env::var("ADMIN_PASSWORD_HASH") {
            Ok(phc) if !phc.trim().is_empty() => AdminPassword::Hashed(phc.trim().to_string()),
            _ => AdminPassword::Plain(
                env::var("ADMIN_PASSWORD").unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string()),
            ),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            bind_addr,
            session_ttl_hours,
            admin_email,
            admin_password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_redacts_admin_password() {
        let cfg = Config {
            database_url: None,
            database_max_connections: 10,
            bind_addr: "127.0.0.1:8080".into(),
            session_ttl_hours: 24,
            admin_email: DEFAULT_ADMIN_EMAIL.into(),
            admin_password: AdminPassword::Plain("hunter2-admin".into()),
        };
        let printed = format!("{cfg:?}");
        assert!(printed.contains(DEFAULT_ADMIN_EMAIL));
        assert!(!printed.contains("hunter2-admin"));
    }
}
