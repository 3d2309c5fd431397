use dotenv::dotenv;
use std::env;

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        ParseInt(::std::num::ParseIntError);
    }
}

pub static DEFAULT_MEDIA_URL: &str = "/media/";

// Two weeks, the usual lifetime of a login cookie.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 336;

fn session_ttl(value: Option<String>) -> Result<i64> {
    let hours = match value {
        Some(hours) => hours.trim().parse::<i64>()?,
        None => return Ok(DEFAULT_SESSION_TTL_HOURS),
    };
    if hours <= 0 {
        bail!("SESSION_TTL_HOURS must be positive, got {}", hours);
    }
    Ok(hours)
}

/// Settings read from the process environment (and `.env`, when present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub session_secret: String,
    pub media_url: String,
    pub session_ttl_hours: i64,
}

impl Settings {
    pub fn from_env() -> Result<Settings> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")?;
        let session_secret = env::var("SESSION_SECRET")?;
        if session_secret.trim().is_empty() {
            bail!("SESSION_SECRET must not be empty");
        }
        let media_url = env::var("MEDIA_URL").unwrap_or_else(|_| DEFAULT_MEDIA_URL.to_string());
        let session_ttl_hours = session_ttl(env::var("SESSION_TTL_HOURS").ok())?;

        Ok(Settings {
            database_url,
            session_secret,
            media_url,
            session_ttl_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ttl_defaults_to_two_weeks() {
        assert_eq!(session_ttl(None).unwrap(), DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(session_ttl(Some("24".to_string())).unwrap(), 24);
    }

    #[test]
    fn session_ttl_must_be_a_positive_number() {
        assert!(session_ttl(Some("0".to_string())).is_err());
        assert!(session_ttl(Some("-5".to_string())).is_err());
        assert!(session_ttl(Some("two".to_string())).is_err());
    }
}
