use crate::application::payment::PollPolicy;
use crate::domain::StudentId;
use crate::domain::session::{Role, Session};
use crate::infrastructure::mpesa::{MpesaCredentials, SANDBOX_URL};
use clap::Args;
use std::time::Duration;

/// Connection to the hosted relational store.
#[derive(Args, Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the store; the REST API lives under `/rest/v1`.
    #[arg(long = "store-url", env = "HOSTEL_STORE_URL")]
    pub url: String,

    #[arg(long = "store-api-key", env = "HOSTEL_STORE_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,
}

/// Who is calling.
#[derive(Args, Debug, Clone)]
pub struct SessionConfig {
    #[arg(long, env = "HOSTEL_USER_ID")]
    pub user_id: StudentId,

    #[arg(long, env = "HOSTEL_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, value_enum, env = "HOSTEL_ROLE", default_value = "student")]
    pub role: Role,
}

impl SessionConfig {
    pub fn session(&self) -> Session {
        let session = match self.role {
            Role::Student => Session::student(self.user_id),
            Role::Admin => Session::admin(self.user_id),
        };
        match &self.access_token {
            Some(token) => session.with_access_token(token.clone()),
            None => session,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MpesaConfig {
    #[arg(long = "mpesa-base-url", env = "MPESA_BASE_URL", default_value = SANDBOX_URL)]
    pub base_url: String,

    #[arg(long = "mpesa-consumer-key", env = "MPESA_CONSUMER_KEY", default_value = "", hide_env_values = true)]
    pub consumer_key: String,

    #[arg(long = "mpesa-consumer-secret", env = "MPESA_CONSUMER_SECRET", default_value = "", hide_env_values = true)]
    pub consumer_secret: String,

    #[arg(long = "mpesa-short-code", env = "MPESA_SHORT_CODE", default_value = "174379")]
    pub short_code: String,

    #[arg(long = "mpesa-passkey", env = "MPESA_PASSKEY", default_value = "", hide_env_values = true)]
    pub passkey: String,

    #[arg(long = "mpesa-callback-url", env = "MPESA_CALLBACK_URL", default_value = "https://example.com/mpesa/callback")]
    pub callback_url: String,
}

impl MpesaConfig {
    pub fn credentials(&self) -> MpesaCredentials {
        MpesaCredentials {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
            short_code: self.short_code.clone(),
            passkey: self.passkey.clone(),
            callback_url: self.callback_url.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PollConfig {
    /// Seconds between status checks of a pending payment.
    #[arg(
        long = "poll-interval-secs",
        env = "HOSTEL_POLL_INTERVAL_SECS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval_secs: u64,

    /// Seconds after which a pending payment is given up on.
    #[arg(
        long = "poll-timeout-secs",
        env = "HOSTEL_POLL_TIMEOUT_SECS",
        default_value_t = 120,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,
}

impl PollConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        session: SessionConfig,
        #[command(flatten)]
        poll: PollConfig,
    }

    #[test]
    fn test_defaults_to_student_and_five_second_polls() {
        let id = StudentId::new();
        let cli = TestCli::try_parse_from(["hostel", "--user-id", &id.to_string()]).unwrap();

        let session = cli.session.session();
        assert_eq!(session.role, Role::Student);
        assert_eq!(session.user_id, id);
        assert_eq!(cli.poll.policy(), PollPolicy::default());
    }

    #[test]
    fn test_admin_role_and_token() {
        let id = StudentId::new();
        let cli = TestCli::try_parse_from([
            "hostel",
            "--user-id",
            &id.to_string(),
            "--role",
            "admin",
            "--access-token",
            "jwt",
        ])
        .unwrap();

        let session = cli.session.session();
        assert_eq!(session.role, Role::Admin);
        assert_eq!(session.access_token.as_deref(), Some("jwt"));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let id = StudentId::new().to_string();
        let err = TestCli::try_parse_from([
            "hostel",
            "--user-id",
            id.as_str(),
            "--poll-interval-secs",
            "0",
        ])
        .err()
        .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = TestCli::try_parse_from([
            "hostel",
            "--user-id",
            id.as_str(),
            "--poll-interval-secs",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.poll.policy().interval, Duration::from_secs(2));
    }
}
