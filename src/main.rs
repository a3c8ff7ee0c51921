use clap::Parser;
use qdbfront::debugger::{ConnectConfig, SessionConfig};
use qdbfront::ui::console::{AppBuilder, LOGGER_ONCE};
use std::time::Duration;

/// Command line arguments win over `QDB_HOST`, `QDB_PORT` and `QDB_AUTHKEY`,
/// which win over the defaults.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host the agent listens on [default: localhost].
    #[clap(long)]
    host: Option<String>,

    /// Port the agent listens on [default: 6000].
    #[clap(long)]
    port: Option<u16>,

    /// Secret shared with the agent.
    #[clap(long)]
    authkey: Option<String>,

    /// Do not stop at the first line of the program.
    #[clap(long)]
    run: bool,

    /// Connection attempts before giving up.
    #[clap(long, default_value_t = 10)]
    attempts: u32,

    /// Seconds to wait for an agent response.
    #[clap(long, default_value_t = 10)]
    response_timeout: u64,
}

impl Args {
    fn connect_config(&self) -> ConnectConfig {
        let mut connect = ConnectConfig::from_env();
        if let Some(ref host) = self.host {
            connect.host = host.clone();
        }
        if let Some(port) = self.port {
            connect.port = port;
        }
        if let Some(ref authkey) = self.authkey {
            connect.authkey = authkey.clone();
        }
        connect
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    LOGGER_ONCE.call_once(env_logger::init);

    let connect = args.connect_config();
    let mut config = SessionConfig {
        run_without_pausing: args.run,
        response_timeout: Duration::from_secs(args.response_timeout),
        ..SessionConfig::default()
    };
    config.attach_retry.attempts = args.attempts;

    AppBuilder::new(connect, config).build()?.run()
}
