use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "audiobox")]
#[command(about = "Audio extraction service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server and the retention sweeper
    Server(ServerArgs),
    /// Run one retention pass over the download directory and exit
    Sweep,
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}
