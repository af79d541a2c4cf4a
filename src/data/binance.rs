use {
    async_trait::async_trait,
    binance_sdk::{
        config::ConfigurationRestApi,
        errors::ConnectorError,
        spot::{
            SpotRestApi,
            rest_api::{KlinesIntervalEnum, KlinesItemInner, KlinesParams, RestApi},
        },
    },
    std::convert::TryFrom,
};

use crate::{
    config::BinanceApiConfig,
    data::fetcher::{FetchDirection, FetchError, WindowFetcher, ensure_ascending},
    domain::{Kline, PairInterval},
    utils::TimeUtils,
};

pub fn try_interval_from_ms(ms: i64) -> Result<KlinesIntervalEnum, String> {
    use TimeUtils as T;
    match ms {
        T::MS_IN_S => Ok(KlinesIntervalEnum::Interval1s),
        T::MS_IN_MIN => Ok(KlinesIntervalEnum::Interval1m),
        T::MS_IN_3_MIN => Ok(KlinesIntervalEnum::Interval3m),
        T::MS_IN_5_MIN => Ok(KlinesIntervalEnum::Interval5m),
        T::MS_IN_15_MIN => Ok(KlinesIntervalEnum::Interval15m),
        T::MS_IN_30_MIN => Ok(KlinesIntervalEnum::Interval30m),
        T::MS_IN_H => Ok(KlinesIntervalEnum::Interval1h),
        T::MS_IN_2_H => Ok(KlinesIntervalEnum::Interval2h),
        T::MS_IN_4_H => Ok(KlinesIntervalEnum::Interval4h),
        T::MS_IN_6_H => Ok(KlinesIntervalEnum::Interval6h),
        T::MS_IN_8_H => Ok(KlinesIntervalEnum::Interval8h),
        T::MS_IN_12_H => Ok(KlinesIntervalEnum::Interval12h),
        T::MS_IN_D => Ok(KlinesIntervalEnum::Interval1d),
        T::MS_IN_3_D => Ok(KlinesIntervalEnum::Interval3d),
        T::MS_IN_W => Ok(KlinesIntervalEnum::Interval1w),
        T::MS_IN_1_M => Ok(KlinesIntervalEnum::Interval1M),
        _ => Err(format!("Unsupported interval: {}ms", ms)),
    }
}

fn next_integer(
    items: &mut impl Iterator<Item = KlinesItemInner>,
    field: &str,
) -> Result<i64, FetchError> {
    match items.next() {
        Some(KlinesItemInner::Integer(v)) => Ok(v),
        other => Err(FetchError::Protocol(format!(
            "kline field {field}: expected integer, got {other:?}"
        ))),
    }
}

fn next_decimal(
    items: &mut impl Iterator<Item = KlinesItemInner>,
    field: &str,
) -> Result<f64, FetchError> {
    match items.next() {
        Some(KlinesItemInner::String(s)) => s.parse::<f64>().map_err(|_| {
            FetchError::Protocol(format!("kline field {field}: unparseable decimal {s:?}"))
        }),
        other => Err(FetchError::Protocol(format!(
            "kline field {field}: expected decimal string, got {other:?}"
        ))),
    }
}

impl TryFrom<Vec<KlinesItemInner>> for Kline {
    type Error = FetchError;

    // Raw shape: [open_time, open, high, low, close, volume, close_time,
    // quote_volume, trade_count, taker_buy_base, taker_buy_quote, ignore]
    fn try_from(raw: Vec<KlinesItemInner>) -> Result<Self, Self::Error> {
        if raw.len() != 12 {
            return Err(FetchError::Protocol(format!(
                "kline array has {} elements, expected 12",
                raw.len()
            )));
        }

        let mut items = raw.into_iter();
        let kline = Kline {
            open_time: next_integer(&mut items, "open_time")?,
            open: next_decimal(&mut items, "open")?,
            high: next_decimal(&mut items, "high")?,
            low: next_decimal(&mut items, "low")?,
            close: next_decimal(&mut items, "close")?,
            volume: next_decimal(&mut items, "volume")?,
            close_time: next_integer(&mut items, "close_time")?,
            quote_volume: next_decimal(&mut items, "quote_volume")?,
            trade_count: next_integer(&mut items, "trade_count")?,
            taker_buy_base: next_decimal(&mut items, "taker_buy_base")?,
            taker_buy_quote: next_decimal(&mut items, "taker_buy_quote")?,
        };
        // The trailing "ignore" field is dropped.
        Ok(kline)
    }
}

fn convert_klines(data: Vec<Vec<KlinesItemInner>>) -> Result<Vec<Kline>, FetchError> {
    data.into_iter().map(Vec::try_into).collect()
}

fn classify_connector_error(err: &anyhow::Error) -> FetchError {
    if let Some(conn_err) = err.downcast_ref::<ConnectorError>() {
        match conn_err {
            ConnectorError::TooManyRequestsError(msg) => FetchError::RateLimited(msg.clone()),
            ConnectorError::RateLimitBanError(msg) => FetchError::RateLimited(msg.clone()),
            ConnectorError::NetworkError(msg) => FetchError::Transient(msg.clone()),
            ConnectorError::ServerError { msg, status_code } => {
                FetchError::Transient(format!("{msg} (status code: {status_code:?})"))
            }
            ConnectorError::ConnectorClientError(msg) => FetchError::Protocol(msg.clone()),
            ConnectorError::BadRequestError(msg) => FetchError::Protocol(msg.clone()),
            ConnectorError::NotFoundError(msg) => FetchError::Protocol(msg.clone()),
            other => FetchError::Transient(format!("unexpected connector error: {other:?}")),
        }
    } else {
        FetchError::Transient(format!("{err:#}"))
    }
}

/// Window fetcher backed by the Binance spot REST API.
pub struct BinanceFetcher {
    rest_client: RestApi,
    pair: PairInterval,
}

impl BinanceFetcher {
    pub fn new(pair: PairInterval) -> Result<Self, anyhow::Error> {
        // Reject unsupported intervals up front rather than on the first fetch.
        try_interval_from_ms(pair.interval_ms).map_err(anyhow::Error::msg)?;

        let config = BinanceApiConfig::default();
        let rest_conf = ConfigurationRestApi::builder()
            .timeout(config.timeout_ms)
            .retries(config.retries)
            .backoff(config.backoff_ms)
            .build()?;
        let rest_client = SpotRestApi::production(rest_conf);
        Ok(Self { rest_client, pair })
    }
}

#[async_trait]
impl WindowFetcher for BinanceFetcher {
    async fn fetch(
        &self,
        anchor: Option<i64>,
        direction: FetchDirection,
        limit: i64,
    ) -> Result<Vec<Kline>, FetchError> {
        // The API's endTime is inclusive; our Backward anchor is exclusive.
        let (start_time, end_time) = match (anchor, direction) {
            (None, _) => (None, None),
            (Some(t), FetchDirection::Forward) => (Some(t), None),
            (Some(t), FetchDirection::Backward) => (None, Some(t - 1)),
        };

        let interval = try_interval_from_ms(self.pair.interval_ms).map_err(FetchError::Protocol)?;
        let params = KlinesParams::builder(self.pair.bn_name().to_string(), interval)
            .limit(limit as i32)
            .start_time(start_time)
            .end_time(end_time)
            .build()
            .map_err(|e| FetchError::Protocol(format!("klines params: {e:#}")))?;

        let response = self
            .rest_client
            .klines(params)
            .await
            .map_err(|e| classify_connector_error(&e))?;

        let data = response
            .data()
            .await
            .map_err(|e| FetchError::Transient(format!("reading klines body: {e:#}")))?;

        let window = convert_klines(data)?;
        ensure_ascending(&window)?;
        Ok(window)
    }
}
