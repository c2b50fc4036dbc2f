//! Aggregates the balloon history and prints every marker's popup, followed by a
//! per-hour summary.
//!
//! Usage: `plot_balloons [--watch] [PROXY_BASE_URL]`
//!
//! With a proxy base URL (e.g. `http://localhost:3000/api`) requests go through the
//! proxy endpoints, otherwise straight to the upstream feeds. `--watch` refreshes
//! every minute until Ctrl-C.

use balloon_history::{
    render, Aggregation, BalloonHistoryError, FeedConfig, FeedMode, HistoryAggregator,
    HourOutcome, HttpFeedGateway, DEFAULT_REFRESH_PERIOD,
};
use tokio_util::sync::CancellationToken;

fn print_aggregation(aggregation: &Aggregation) {
    for point in &aggregation.points {
        println!("{}\n", render::popup_text(point));
    }

    for report in &aggregation.hours {
        match &report.outcome {
            HourOutcome::Fetched {
                received,
                valid,
                kept,
            } => println!(
                "hour {}: {} entries, {} valid, {} new",
                report.hour, received, valid, kept
            ),
            HourOutcome::Skipped(reason) => println!("hour {}: skipped ({})", report.hour, reason),
            HourOutcome::Failed(reason) => println!("hour {}: failed ({})", report.hour, reason),
        }
    }
    println!(
        "{} balloons from {}/24 hours",
        aggregation.points.len(),
        aggregation.hours_covered()
    );
}

#[tokio::main]
async fn main() -> Result<(), BalloonHistoryError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let watch = args.iter().any(|a| a == "--watch");
    let mode = match args.iter().find(|a| !a.starts_with("--")) {
        Some(base_url) => FeedMode::proxy(base_url.as_str()),
        None => FeedMode::Upstream,
    };

    let gateway = HttpFeedGateway::new(FeedConfig::builder().mode(mode).build())?;
    let aggregator = HistoryAggregator::builder()
        .gateway(gateway)
        .max_concurrent_lookups(4)
        .build();

    if !watch {
        print_aggregation(&aggregator.run().await?);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        on_ctrl_c.cancel();
    });
    aggregator
        .watch(DEFAULT_REFRESH_PERIOD, shutdown, |aggregation| {
            print_aggregation(&aggregation)
        })
        .await;
    Ok(())
}
