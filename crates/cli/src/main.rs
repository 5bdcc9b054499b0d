use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use roster_api::{AccountDirectory, Config, Dashboard, LoadReport, PostsPage, Session, SourceKind, UsersPage};
use roster_core::FetchStatus;
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rosterctl", version, about = "Roster dashboard CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Where records come from
    #[arg(long = "source", value_enum, global = true, default_value_t = SourceArg::Http)]
    source: SourceArg,

    /// Directory holding users.json and posts.json (with --source file)
    #[arg(long = "fixture", global = true)]
    fixture: Option<PathBuf>,

    /// Base URL of the users/posts API
    #[arg(long = "api-base", global = true, env = "ROSTER_API_BASE")]
    api_base: Option<String>,

    #[arg(long = "email", global = true, env = "ROSTER_EMAIL")]
    email: Option<String>,

    #[arg(long = "password", global = true, env = "ROSTER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json, Yaml }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum SourceArg { Http, File }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List one page of users
    Users {
        #[arg(long = "page", default_value_t = 1)]
        page: usize,
        /// Query, e.g. "company:romaguera re:\.biz$ leanne"
        #[arg(long = "filter")]
        filter: Option<String>,
        /// Print per-stage filter counts
        #[arg(long = "explain", action = ArgAction::SetTrue)]
        explain: bool,
    },
    /// List one page of posts with their authors
    Posts {
        #[arg(long = "page", default_value_t = 1)]
        page: usize,
        #[arg(long = "filter")]
        filter: Option<String>,
    },
    /// Drag a user onto another user of the same page
    Reorder {
        dragged: u64,
        target: u64,
        #[arg(long = "page", default_value_t = 1)]
        page: usize,
        #[arg(long = "filter")]
        filter: Option<String>,
    },
    /// Dashboard metric cards
    Stats,
    /// Register an account in the in-memory directory
    Register {
        name: String,
        /// Account email (distinct from the global sign-in --email)
        account_email: String,
        account_password: String,
    },
}

fn init_tracing() {
    let env = std::env::var("ROSTER_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("ROSTER_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid ROSTER_METRICS_ADDR; expected host:port");
        }
    }
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut cfg = Config::from_env();
    if let Some(base) = &cli.api_base {
        cfg.api_base = base.clone();
    }
    cfg.source = match (cli.source, &cli.fixture) {
        (SourceArg::Http, _) => SourceKind::Http,
        (SourceArg::File, Some(dir)) => SourceKind::Fixtures { users: dir.join("users.json"), posts: dir.join("posts.json") },
        (SourceArg::File, None) => bail!("--source file needs --fixture DIR"),
    };
    Ok(cfg)
}

fn sign_in(cli: &Cli, dir: &AccountDirectory) -> Session {
    match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => dir.sign_in(email, password),
        _ => Session::anonymous(),
    }
}

fn emit<T: Serialize>(output: Output, value: &T, human: impl FnOnce()) -> Result<()> {
    match output {
        Output::Human => human(),
        Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Output::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Load both collections, giving up early on Ctrl-C.
async fn load(dash: &mut Dashboard, session: &Session) -> Result<LoadReport> {
    let report = tokio::select! {
        r = dash.load(session) => r,
        _ = signal::ctrl_c() => {
            info!("Ctrl-C received; aborting load");
            bail!("interrupted");
        }
    };
    if report.skipped {
        bail!("not signed in; pass --email/--password (or ROSTER_EMAIL/ROSTER_PASSWORD)");
    }
    for e in &report.errors {
        warn!(error = %e, "load reported an error");
    }
    Ok(report)
}

fn status_line(status: FetchStatus, error: Option<&str>) {
    if status == FetchStatus::Failed {
        eprintln!("fetch failed: {} (showing last known data)", error.unwrap_or("unknown error"));
    }
}

fn print_users(p: &UsersPage) {
    status_line(p.status, p.error.as_deref());
    println!("{:<4} {:<24} {:<28} COMPANY", "ID", "NAME", "EMAIL");
    for u in &p.page.items {
        println!("{:<4} {:<24} {:<28} {}", u.id, u.name, u.email, u.company.name);
    }
    let filter = p.filter.as_deref().map(|f| format!(" filter={f}")).unwrap_or_default();
    println!("page {}/{} ({} users){}", p.page.page, p.page.total_pages.max(1), p.page.total_items, filter);
}

fn print_posts(p: &PostsPage) {
    status_line(p.status, p.error.as_deref());
    println!("{:<4} {:<20} TITLE", "ID", "AUTHOR");
    for row in &p.rows {
        println!("{:<4} {:<20} {}", row.post.id, row.author, row.post.title);
    }
    println!("page {}/{} ({} posts)", p.page, p.total_pages.max(1), p.total_items);
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let mut accounts = AccountDirectory::with_demo_admin();

    match &cli.command {
        Commands::Users { page, filter, explain } => {
            metrics::counter!("cli_commands_total", 1u64, "cmd" => "users");
            let cfg = build_config(&cli)?;
            let mut dash = Dashboard::from_config(&cfg)?;
            load(&mut dash, &sign_in(&cli, &accounts)).await?;
            if let Some(q) = filter {
                dash.filter_users(q)?;
            }
            dash.users_goto(*page)?;
            let view = dash.users_page();
            emit(cli.output, &view, || print_users(&view))?;
            if *explain {
                let dbg = dash.explain_users(filter.as_deref().unwrap_or(""))?;
                eprintln!("debug: total={} after_fields={} after_patterns={} after_free_text={}", dbg.total, dbg.after_fields, dbg.after_patterns, dbg.after_free_text);
            }
        }
        Commands::Posts { page, filter } => {
            metrics::counter!("cli_commands_total", 1u64, "cmd" => "posts");
            let cfg = build_config(&cli)?;
            let mut dash = Dashboard::from_config(&cfg)?;
            load(&mut dash, &sign_in(&cli, &accounts)).await?;
            if let Some(q) = filter {
                dash.filter_posts(q)?;
            }
            dash.posts_goto(*page)?;
            let view = dash.posts_page();
            emit(cli.output, &view, || print_posts(&view))?;
        }
        Commands::Reorder { dragged, target, page, filter } => {
            metrics::counter!("cli_commands_total", 1u64, "cmd" => "reorder");
            let cfg = build_config(&cli)?;
            let mut dash = Dashboard::from_config(&cfg)?;
            load(&mut dash, &sign_in(&cli, &accounts)).await?;
            if let Some(q) = filter {
                dash.filter_users(q)?;
            }
            dash.users_goto(*page)?;
            let outcome = dash.reorder_users(*dragged, *target)?;
            info!(dragged, target, outcome = ?outcome, "reorder invoked");

            #[derive(Serialize)]
            struct Reordered<'a> { outcome: roster_view::ReorderOutcome, order: Vec<u64>, page: &'a UsersPage }
            let view = dash.users_page();
            let out = Reordered { outcome, order: dash.users().snapshot().ids(), page: &view };
            emit(cli.output, &out, || {
                println!("{:?}", outcome);
                print_users(&view);
            })?;
        }
        Commands::Stats => {
            metrics::counter!("cli_commands_total", 1u64, "cmd" => "stats");
            let cfg = build_config(&cli)?;
            let mut dash = Dashboard::from_config(&cfg)?;
            load(&mut dash, &sign_in(&cli, &accounts)).await?;
            let cards = dash.overview()?;
            emit(cli.output, &cards, || {
                for c in &cards {
                    println!("{:<14} {:>8}  {} {} of limit {} ({:.0}%)", c.name, c.display_value(), c.trend.arrow(), c.change, c.limit, c.bar_width());
                }
            })?;
        }
        Commands::Register { name, account_email, account_password } => {
            metrics::counter!("cli_commands_total", 1u64, "cmd" => "register");
            let acct = accounts.register(name, account_email, account_password)?;
            emit(cli.output, &acct, || println!("registered {} <{}> as id {}", acct.name, acct.email, acct.id))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_source_requires_fixture_dir() {
        let cli = Cli::parse_from(["rosterctl", "--source", "file", "stats"]);
        assert!(build_config(&cli).is_err());

        let cli = Cli::parse_from(["rosterctl", "--source", "file", "--fixture", "/tmp/demo", "users", "--page", "2"]);
        let cfg = build_config(&cli).unwrap();
        assert_eq!(
            cfg.source,
            SourceKind::Fixtures { users: PathBuf::from("/tmp/demo/users.json"), posts: PathBuf::from("/tmp/demo/posts.json") }
        );
    }

    #[test]
    fn missing_credentials_mean_anonymous() {
        let dir = AccountDirectory::with_demo_admin();
        // Flags win over ROSTER_EMAIL/ROSTER_PASSWORD, so each case is pinned explicitly.
        let mut cli = Cli::try_parse_from(["rosterctl", "--email", "admin@example.com", "--password", "password123", "stats"]).unwrap();
        assert!(sign_in(&cli, &dir).authenticated);

        cli.password = None;
        assert!(!sign_in(&cli, &dir).authenticated);

        cli.email = None;
        assert!(!sign_in(&cli, &dir).authenticated);

        cli.email = Some("admin@example.com".into());
        cli.password = Some("wrong".into());
        assert!(!sign_in(&cli, &dir).authenticated);
    }
}
