use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = camrec::Cli::parse();
    camrec::init_logger(cli.verbose);
    camrec::run(cli)
}
