use clap::Parser;
use miette::Result;
use tdb::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior so piping to `head` exits quietly
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    tdb::cli::logger::init(global.verbose, global.quiet);

    match cli.command {
        Commands::Init(args) => tdb::cli::commands::init::run(args),
        Commands::Device(cmd) => tdb::cli::commands::device::run(cmd, &global),
        Commands::Wp(args) => tdb::cli::commands::wp::run(args, &global),
        Commands::Export(args) => tdb::cli::commands::export::run(args, &global),
        Commands::Validate(args) => tdb::cli::commands::validate::run(args, &global),
        Commands::Index(cmd) => tdb::cli::commands::index::run(cmd, &global),
        Commands::Completions(args) => tdb::cli::commands::completions::run(args),
    }
}
