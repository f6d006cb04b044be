use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub business_name: String,
    /// Used until a schedule has been saved through the admin API.
    pub slot_granularity_minutes: u32,
    pub hold_lease_minutes: i64,
    pub max_hold_lease_minutes: i64,
    pub sweep_interval_secs: u64,
    /// Expired holds stay in the table this long so a late confirm reports `Expired`.
    pub expired_hold_retention_minutes: i64,
    pub business_utc_offset_minutes: i64,
    pub cors_allow_origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "slotbook.db".to_string(),
            admin_token: "changeme".to_string(),
            business_name: "Cleaning Service".to_string(),
            slot_granularity_minutes: 30,
            hold_lease_minutes: 15,
            max_hold_lease_minutes: 60,
            sweep_interval_secs: 60,
            expired_hold_retention_minutes: 10,
            business_utc_offset_minutes: 0,
            cors_allow_origin: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parse_var("PORT", defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or(defaults.admin_token),
            business_name: env::var("BUSINESS_NAME").unwrap_or(defaults.business_name),
            slot_granularity_minutes: parse_var(
                "SLOT_GRANULARITY_MINUTES",
                defaults.slot_granularity_minutes,
            ),
            hold_lease_minutes: parse_var("HOLD_LEASE_MINUTES", defaults.hold_lease_minutes),
            max_hold_lease_minutes: parse_var(
                "MAX_HOLD_LEASE_MINUTES",
                defaults.max_hold_lease_minutes,
            ),
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
            expired_hold_retention_minutes: parse_var(
                "EXPIRED_HOLD_RETENTION_MINUTES",
                defaults.expired_hold_retention_minutes,
            ),
            business_utc_offset_minutes: parse_var(
                "BUSINESS_UTC_OFFSET_MINUTES",
                defaults.business_utc_offset_minutes,
            ),
            cors_allow_origin: env::var("CORS_ALLOW_ORIGIN").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Requested lease, or the default, clamped to `1..=max_hold_lease_minutes`.
    pub fn lease_minutes(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.hold_lease_minutes)
            .clamp(1, self.max_hold_lease_minutes.max(1))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
