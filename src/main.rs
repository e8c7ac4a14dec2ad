//! Command-line front end for the GitHub statistics client.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, ValueEnum};
use core::time::Duration;
use octostat::stats::RateLimitState;
use octostat::stats::StatisticsSnapshot;
use octostat::{StatsClient, StatsConfig};
use ohno::IntoAppError;
use owo_colors::OwoColorize;
use std::io::{IsTerminal, Write, stdout};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

#[derive(Parser, Debug)]
#[command(name = "octostat", version, about = "Collect and display GitHub account statistics", author)]
#[command(styles = CLAP_STYLES)]
struct Args {
    /// GitHub login to collect statistics for
    #[arg(value_name = "LOGIN")]
    login: String,

    /// GitHub personal access token (traffic data requires push access)
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN")]
    token: Option<String>,

    /// Base API URL
    #[arg(long, value_name = "URL", default_value = "https://api.github.com")]
    base_url: String,

    /// Bypass cached data and fetch everything anew
    #[arg(long)]
    refresh: bool,

    /// Keep running, re-displaying statistics at a fixed interval
    #[arg(long)]
    watch: bool,

    /// Seconds between rounds in watch mode
    #[arg(long, value_name = "SECONDS", default_value_t = 300)]
    interval: u64,

    /// Number of languages and repositories to show
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    top: usize,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    log_level: LogLevel,
}

fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}

fn render<W: Write>(writer: &mut W, snapshot: &StatisticsSnapshot, rate: Option<RateLimitState>, top: usize, use_colors: bool) -> std::io::Result<()> {
    let title = format!("Statistics for {}", snapshot.user.login);
    if use_colors {
        writeln!(writer, "{}", title.bold())?;
    } else {
        writeln!(writer, "{title}")?;
    }

    if let Some(name) = &snapshot.user.name {
        writeln!(writer, "  {name}")?;
    }
    writeln!(
        writer,
        "  {} public repos, {} followers, following {}",
        snapshot.user.public_repos, snapshot.user.followers, snapshot.user.following
    )?;
    writeln!(writer, "  {} stars and {} forks across {} repositories", snapshot.total_stars, snapshot.total_forks, snapshot.repositories.len())?;

    let languages = snapshot.language_totals();
    if !languages.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Languages")?;
        let total_bytes: u64 = languages.iter().map(|(_, bytes)| bytes).sum();
        for (language, bytes) in languages.iter().take(top) {
            #[expect(clippy::cast_precision_loss, reason = "Percentages do not need exact byte counts")]
            let percent = if total_bytes == 0 { 0.0 } else { *bytes as f64 * 100.0 / total_bytes as f64 };
            writeln!(writer, "  {language:<16} {percent:5.1}%")?;
        }
    }

    if !snapshot.traffic.is_empty() {
        let (views, uniques) = snapshot.traffic_totals();
        writeln!(writer)?;
        writeln!(writer, "Traffic (last 14 days)")?;
        writeln!(writer, "  {views} views from {uniques} unique visitors")?;
    }

    let mut repos: Vec<_> = snapshot.repositories.iter().collect();
    repos.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
    if !repos.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Top repositories")?;
        for repo in repos.iter().take(top) {
            let language = repo.language.as_deref().unwrap_or("-");
            writeln!(writer, "  {:<32} ★ {:<6} {language}", repo.name, repo.stargazers_count)?;
        }
    }

    if !snapshot.recent_events.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Recent activity")?;
        for event in snapshot.recent_events.iter().take(top) {
            writeln!(writer, "  {:<24} {}", event.kind, event.repo.name)?;
        }
    }

    if snapshot.partial {
        writeln!(writer)?;
        let heading = "Some resources could not be fetched";
        if use_colors {
            writeln!(writer, "{}", heading.yellow().bold())?;
        } else {
            writeln!(writer, "{heading}")?;
        }
        for failure in &snapshot.failed_resources {
            writeln!(writer, "  {failure}")?;
        }
    }

    if let Some(rate) = rate {
        writeln!(writer)?;
        writeln!(writer, "Rate limit: {}/{} remaining, resets at {}", rate.remaining, rate.limit, rate.reset_at.to_rfc3339())?;
    }

    writeln!(writer)?;
    writeln!(writer, "Fetched at {}", snapshot.fetched_at.to_rfc3339())?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ohno::AppError> {
    let args = Args::parse();
    init_logging(args.log_level);

    let use_colors = match args.color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => stdout().is_terminal(),
    };

    let config = StatsConfig {
        token: args.token.clone(),
        base_url: args.base_url.trim_end_matches('/').to_string(),
        ..StatsConfig::default()
    };

    let client = StatsClient::new(config)?;

    let mut first = true;
    loop {
        let snapshot = if args.refresh && first {
            client.refresh(&args.login).await
        } else {
            client.get_statistics(&args.login).await
        }
        .into_app_err_with(|| format!("collecting statistics for '{}'", args.login))?;
        let rate = client.rate_limit().await.ok();

        let mut out = stdout().lock();
        render(&mut out, &snapshot, rate, args.top, use_colors).into_app_err("writing output")?;

        if !args.watch {
            break;
        }
        first = false;
        tokio::time::sleep(Duration::from_secs(args.interval)).await;
    }

    Ok(())
}
