use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use log::info;

use crate::domain::Kline;

/// Column order matches the raw exchange kline array minus its trailing
/// "ignore" field. Timestamps are emitted as millisecond epoch integers.
const HEADER: [&str; 11] = [
    "open_time",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time",
    "quote_asset_volume",
    "number_of_trades",
    "taker_buy_base_asset_volume",
    "taker_buy_quote_asset_volume",
];

pub fn write_csv<W: Write>(out: W, klines: &[Kline]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(HEADER)?;

    for k in klines {
        writer.write_record([
            k.open_time.to_string(),
            k.open.to_string(),
            k.high.to_string(),
            k.low.to_string(),
            k.close.to_string(),
            k.volume.to_string(),
            k.close_time.to_string(),
            k.quote_volume.to_string(),
            k.trade_count.to_string(),
            k.taker_buy_base.to_string(),
            k.taker_buy_quote.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_csv_file(path: &Path, klines: &[Kline]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating output file {}", path.display()))?;
    write_csv(file, klines)?;
    info!("wrote {} records to {}", klines.len(), path.display());
    Ok(())
}
