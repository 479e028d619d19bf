use anyhow::Context;

/// Matches the dashboard's `/history?limit=100` fetch.
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub history_limit: i64,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let history_limit = match std::env::var("HISTORY_LIMIT") {
            Ok(raw) => parse_limit(&raw)?,
            Err(_) => DEFAULT_HISTORY_LIMIT,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            history_limit,
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn parse_limit(raw: &str) -> anyhow::Result<i64> {
    let limit: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("HISTORY_LIMIT must be an integer (got {raw:?})"))?;
    anyhow::ensure!(limit > 0, "HISTORY_LIMIT must be positive (got {limit})");
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_must_be_a_positive_integer() {
        assert_eq!(parse_limit(" 50 ").unwrap(), 50);
        assert!(parse_limit("0").is_err());
        assert!(parse_limit("lots").is_err());
    }

    #[test]
    fn database_url_is_required_on_demand() {
        let settings = Settings {
            database_url: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        };
        assert!(settings.require_database_url().is_err());
    }
}
