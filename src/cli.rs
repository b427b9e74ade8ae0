use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "kube-control-gateway")]
#[command(about = "Live pod log tailing and workload scaling over a Kubernetes cluster")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Namespace used when a request does not name one
    #[arg(short = 'n', long, env = "DEFAULT_NAMESPACE", default_value = "devops-demo")]
    pub namespace: String,

    /// Serve synthetic logs and scale results without contacting a cluster
    #[arg(long = "demo", env = "DEMO_MODE")]
    pub demo: bool,

    /// Kubeconfig context
    #[arg(long)]
    pub context: Option<String>,

    /// Inline kubeconfig YAML, preferred over file based discovery
    #[arg(long, env = "KUBECONFIG_DATA", hide_env_values = true)]
    pub kubeconfig_data: Option<String>,

    /// Timeout in seconds for each call against the cluster
    #[arg(long, default_value_t = 10)]
    pub request_timeout: u64,

    /// Per-connection buffer of pending log chunks
    #[arg(long, default_value_t = 1024)]
    pub buffer_size: usize,

    /// Origin allowed by CORS (any origin when unset)
    #[arg(long, env = "FRONTEND_URL")]
    pub frontend_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
