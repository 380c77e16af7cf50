use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "countrysrv",
    about = "HTTP server that mirrors the REST Countries dataset and serves cached queries over it",
    version,
    author
)]
pub struct Args {
    /// Serve the data already in the store instead of refreshing it at startup
    #[arg(long)]
    pub no_refresh: bool,

    /// Override SERVER_PORT
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Args {
    pub fn should_refresh(&self) -> bool {
        !self.no_refresh
    }
}
