use std::process;

use clap::Parser;

mod cli;
mod commands;
mod context;
mod exit_codes;
mod logging;
mod output;

fn main() {
    logging::init_tracing();

    let cli = cli::Cli::parse();
    let host = context::Host::open(&cli.global);

    let exit_code = match cli.command {
        cli::Command::Tap(args) => {
            let mut out = output::make(args.out.json, args.out.verbose);
            let code = commands::tap::run(args, &host, &mut *out);
            out.finish();
            code
        }
        cli::Command::Check(args) => {
            let mut out = output::make(args.json, args.verbose);
            let code = commands::check::run(&host, &mut *out);
            out.finish();
            code
        }
        cli::Command::Tick(args) => {
            let mut out = output::make(args.json, args.verbose);
            let code = commands::tick::run(&host, &mut *out);
            out.finish();
            code
        }
        cli::Command::Watch(args) => {
            let mut out = output::make_for_watch(&args);
            let code = commands::watch::run(args, &host, &mut *out);
            out.finish();
            code
        }
        cli::Command::Status(args) => {
            let mut out = output::make(args.json, false);
            let code = commands::status::run(&host, &mut *out);
            out.finish();
            code
        }
        cli::Command::Config(args) => {
            let json = matches!(&args.action, cli::ConfigAction::Show(a) if a.json);
            let mut out = output::make(json, false);
            let code = commands::config::run(args, &host, &mut *out);
            out.finish();
            code
        }
        cli::Command::Doctor(args) => {
            let mut out = output::make(args.json, false);
            let code = commands::doctor::run(args, &host, &mut *out);
            out.finish();
            code
        }
    };

    process::exit(exit_code);
}
