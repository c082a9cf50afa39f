//! Connection settings from flags and environment.

use std::time::Duration;

use clap::Args;
use nsxt_reconciler::NsxConfig;

/// NSX manager connection flags. Each one can also be set through its
/// environment variable.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// NSX manager host, optionally with scheme and port
    #[arg(long, env = "NSXT_MANAGER_HOST")]
    pub host: String,

    /// User name for basic authentication
    #[arg(long, env = "NSXT_USERNAME")]
    pub username: String,

    /// Password for basic authentication
    #[arg(long, env = "NSXT_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Accept self-signed manager certificates
    #[arg(long, env = "NSXT_ALLOW_UNVERIFIED_SSL")]
    pub allow_unverified_ssl: bool,

    /// Per-request timeout in seconds
    #[arg(long, env = "NSXT_TIMEOUT_SECS", default_value = "60")]
    pub timeout_secs: u64,
}

impl From<&ConnectionArgs> for NsxConfig {
    fn from(args: &ConnectionArgs) -> Self {
        NsxConfig {
            host: args.host.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
            allow_unverified_ssl: args.allow_unverified_ssl,
            timeout: Duration::from_secs(args.timeout_secs),
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
        connection: ConnectionArgs,
    }

    #[test]
    fn test_flags_convert_to_config() {
        let cli = TestCli::parse_from([
            "nsxt",
            "--host",
            "nsx.lab",
            "--username",
            "admin",
            "--password",
            "secret",
            "--allow-unverified-ssl",
            "--timeout-secs",
            "5",
        ]);
        let config = NsxConfig::from(&cli.connection);
        assert_eq!(config.base_url(), "https://nsx.lab/api/v1");
        assert_eq!(config.username, "admin");
        assert!(config.allow_unverified_ssl);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_defaults_to_a_minute() {
        let cli = TestCli::parse_from([
            "nsxt",
            "--host",
            "nsx.lab",
            "--username",
            "admin",
            "--password",
            "secret",
        ]);
        assert_eq!(cli.connection.timeout_secs, 60);
        assert!(!cli.connection.allow_unverified_ssl);
    }
}
