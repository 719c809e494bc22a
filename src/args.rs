//! Command line flags shared by every check that talks to an OpenStack API.

use structopt::StructOpt;

/// Credentials and connection settings for a Keystone v3 session.
///
/// Flatten this into a check's own `Args` struct with
/// `#[structopt(flatten)]`. Every field can also come from the usual
/// `OS_*` environment variables, so `source openrc && check-nova-api` works.
#[derive(StructOpt, Debug, Clone)]
pub struct OpenStackArgs {
    /// Keystone v3 endpoint, e.g. https://keystone.example.com:5000/v3
    #[structopt(long = "os-auth-url", env = "OS_AUTH_URL")]
    pub auth_url: String,

    #[structopt(long = "os-username", env = "OS_USERNAME")]
    pub username: String,

    #[structopt(long = "os-password", env = "OS_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[structopt(long = "os-project-name", env = "OS_PROJECT_NAME")]
    pub project_name: String,

    #[structopt(
        long = "os-user-domain-name",
        env = "OS_USER_DOMAIN_NAME",
        default_value = "Default"
    )]
    pub user_domain: String,

    #[structopt(
        long = "os-project-domain-name",
        env = "OS_PROJECT_DOMAIN_NAME",
        default_value = "Default"
    )]
    pub project_domain: String,

    /// Only use catalog endpoints from this region
    #[structopt(long = "os-region-name", env = "OS_REGION_NAME")]
    pub region: Option<String>,

    /// Skip TLS certificate verification
    #[structopt(long = "insecure")]
    pub insecure: bool,

    /// Timeout in seconds for a single HTTP request
    #[structopt(long = "http-timeout", default_value = "10")]
    pub http_timeout: u64,
}

/// The `-w`/`-c` pair used by the API latency checks, in seconds.
#[derive(StructOpt, Debug, Clone)]
pub struct LatencyThresholds {
    /// Warning threshold in seconds for the API call
    #[structopt(short = "w", long = "warning", default_value = "5")]
    pub warning: u64,

    /// Critical threshold in seconds for the API call
    #[structopt(short = "c", long = "critical", default_value = "10")]
    pub critical: u64,
}
