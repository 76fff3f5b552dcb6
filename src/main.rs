use clap::Parser;
use gitlab_migrate::{gitlab_migrate_main, GitlabMigrateCli};
use std::process::exit;

/// Log level for the number of `-v`
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() {
    println!(concat!(
        env!("CARGO_PKG_NAME"),
        " ",
        env!("CARGO_PKG_VERSION")
    ));
    let args = GitlabMigrateCli::parse();
    env_logger::builder()
        .filter_level(log_level(args.verbose))
        .format_target(false)
        .format_timestamp(None)
        .init();
    match gitlab_migrate_main(args).await {
        Ok(_) => {
            exit(0);
        }
        Err(e) => {
            log::error!("{e}");
            exit(1);
        }
    };
}
