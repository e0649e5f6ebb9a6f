use bomdex::cli::{commands, Cli, Commands};
use clap::Parser;
use miette::Result;

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

    // Logs go to stderr; stdout stays pipeable
    let default_level = if global.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Index(args) => commands::index::run(args, &global),
        Commands::Articles(args) => commands::articles::run(args, &global),
        Commands::Show(args) => commands::show::run(args, &global),
        Commands::Docs(args) => commands::docs::run(args, &global),
        Commands::Unlinked(args) => commands::unlinked::run(args, &global),
        Commands::Part(args) => commands::part::run(args, &global),
        Commands::WhereUsed(args) => commands::where_used::run(args, &global),
        Commands::Explode(args) => commands::explode::run(args, &global),
        Commands::Runs(args) => commands::runs::run(args, &global),
        Commands::SuggestRevisions(args) => commands::suggest::run(args, &global),
        Commands::EditLine(args) => commands::edit_line::run(args, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
