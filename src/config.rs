use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub db_timeout_ms: u64,
    /// Clinic local time = UTC + this offset.
    pub clinic_utc_offset_minutes: i32,
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let db_max_connections = parsed_or("DB_MAX_CONNECTIONS", 10);
        let db_timeout_ms = parsed_or("DB_TIMEOUT_MS", 5000);
        let clinic_utc_offset_minutes = parsed_or("CLINIC_UTC_OFFSET_MINUTES", 0);

        Ok(Self {
            database_url,
            bind_addr,
            db_max_connections,
            db_timeout_ms,
            clinic_utc_offset_minutes,
        })
    }
}
