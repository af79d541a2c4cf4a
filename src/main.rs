use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use tabled::Table;

use kline_backfill::{
    BackfillConfig, BackfillEngine, BinanceFetcher, Cli, PairInterval, data::write_csv_file,
    utils::TimeUtils,
};

fn init_logging() {
    let (global_level, my_code_level) = if cfg!(debug_assertions) {
        (log::LevelFilter::Warn, log::LevelFilter::Debug)
    } else {
        (log::LevelFilter::Warn, log::LevelFilter::Info)
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter(None, global_level)
        .filter(Some("kline_backfill"), my_code_level)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Cli::parse();

    let Some(interval_ms) = TimeUtils::interval_from_str(&args.interval) else {
        bail!("unsupported interval {:?} (try 1m, 1h, 4h, 1d, ...)", args.interval);
    };
    let pair = PairInterval::new(&args.symbol, interval_ms);
    let output: PathBuf = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!(
            "{}_{}_all.csv",
            pair.name.to_lowercase(),
            args.interval
        ))
    });

    let mut config = BackfillConfig::new(pair);
    if let Some(workers) = args.workers {
        config.max_workers = workers.max(1);
    }
    if let Some(days) = args.chunk_days {
        if days <= 0 {
            bail!("--chunk-days must be positive");
        }
        config.chunk_width_ms = days * TimeUtils::MS_IN_D;
    }

    let fetcher = Arc::new(
        BinanceFetcher::new(config.pair.clone()).context("building Binance REST client")?,
    );
    let engine = BackfillEngine::new(fetcher, config);

    // Ctrl-C aborts cooperatively: in-flight chunks return partial data.
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current batches");
            cancel.cancel();
        }
    });

    let outcome = engine.run(args.crawl_mode()).await?;
    let report = &outcome.report;

    println!("{}", Table::new(&report.partitions));
    println!("pair:       {}", report.pair);
    println!("records:    {}", report.record_count);
    println!("span:       {}", report.span_description());
    println!(
        "dedup:      {} duplicates removed, {} integrity warnings",
        report.merge_stats.duplicates_removed, report.merge_stats.integrity_errors
    );
    if !report.failed_partition_ids.is_empty() {
        println!("failed:     chunks {:?} (partial data kept)", report.failed_partition_ids);
    }
    if !report.gaps.is_empty() {
        let unattributed = report.gaps.iter().filter(|g| !g.attributed).count();
        println!(
            "gaps:       {} total, {} unattributed",
            report.gaps.len(),
            unattributed
        );
    }

    write_csv_file(&output, &outcome.dataset.records)?;
    println!("output:     {}", output.display());

    Ok(())
}
