use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{QuizError, Result};

pub struct Config {
    pub server: ServerConfig,
    pub quiz: QuizConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

pub struct QuizConfig {
    pub questions_path: PathBuf,
    pub timing: QuizTiming,
}

/// Countdown settings shared by every room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizTiming {
    /// Number of `quizTimerUpdate` broadcasts per question.
    pub countdown_secs: u32,
    /// Interval between two countdown ticks.
    pub tick: Duration,
}

impl Default for QuizTiming {
    fn default() -> Self {
        Self {
            countdown_secs: 6,
            tick: Duration::from_secs(1),
        }
    }
}

impl QuizTiming {
    /// Rejects a zero tick, which would leave the countdown unable to run.
    pub fn new(countdown_secs: u32, tick: Duration) -> Result<Self> {
        if tick.is_zero() {
            return Err(QuizError::ConfigurationParseFailed(
                "quiz tick must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            countdown_secs,
            tick,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = QuizTiming::default();

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 4000)?,
                cors_origin: env::var("CORS_ORIGIN")
                    .unwrap_or_else(|_| "http://localhost:4200".to_string()),
            },
            quiz: QuizConfig {
                questions_path: env::var("QUESTIONS_PATH")
                    .unwrap_or_else(|_| "./data/questions.json".to_string())
                    .into(),
                timing: QuizTiming::new(
                    parse_var("QUIZ_COUNTDOWN_SECS", defaults.countdown_secs)?,
                    parse_tick("QUIZ_TICK_MS", defaults.tick)?,
                )?,
            },
        })
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::UNSPECIFIED;
                }
            }
        }

        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::LOCALHOST,
            "" | "0.0.0.0" => Ipv4Addr::UNSPECIFIED,
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::UNSPECIFIED
            }
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| QuizError::ConfigurationParseFailed(format!("{name}={raw}"))),
        Err(_) => Ok(default),
    }
}

fn parse_tick(name: &str, default: Duration) -> Result<Duration> {
    let millis: u64 = parse_var(name, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(QuizError::ConfigurationParseFailed(format!("{name}=0")));
    }
    Ok(Duration::from_millis(millis))
}
