use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = vbactl::cli::Cli::parse();
    vbactl::cli::run(cli)
}
