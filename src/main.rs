use color_eyre::Result;
use draftwire::cli::{self, CliCommand};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let command = match cli::parse_args(std::env::args()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, cli::USAGE);
            std::process::exit(2);
        }
    };

    match command {
        CliCommand::Version => println!("draftwire {}", cli::VERSION),
        CliCommand::Help => println!("{}", cli::USAGE),
        CliCommand::Run(args) => {
            draftwire::logging::init(args.verbose);
            let code = cli::run(args).await?;
            std::process::exit(code);
        }
    }

    Ok(())
}
