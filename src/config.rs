use anyhow::Context;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to the LMS Postgres instance")?;
        let max_connections = parse_max_connections(std::env::var("LMS_MAX_CONNECTIONS").ok())?;

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

fn parse_max_connections(raw: Option<String>) -> anyhow::Result<u32> {
    match raw {
        None => Ok(DEFAULT_MAX_CONNECTIONS),
        Some(value) => {
            let parsed: u32 = value
                .trim()
                .parse()
                .with_context(|| format!("LMS_MAX_CONNECTIONS is not a number: '{value}'"))?;
            anyhow::ensure!(parsed > 0, "LMS_MAX_CONNECTIONS must be at least 1");
            Ok(parsed)
        }
    }
}
