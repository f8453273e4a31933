use super::ui;
use crate::core::calendar::MarketContext;
use crate::core::config::{AppConfig, CollectionKind};
use crate::core::store::FieldStore;
use crate::core::table::{Series, Table};
use crate::fetchers::{
    CaxFetcher, DayFetcher, FetchOptions, Fetcher, MinuteDaily, MinuteFetcher, MinuteField,
    MiscFetcher, QuoteFetcher, QuoteField, Times,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Which of the request shapes a day query uses.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Range {
        start: String,
        end: Option<String>,
        backdays: usize,
    },
    History {
        date: String,
        backdays: usize,
    },
    Daily {
        date: String,
        offset: usize,
    },
}

/// Flags set on the command line; unset flags fall back to the config defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryFlags {
    pub reindex: bool,
    pub datetime_index: bool,
    pub delay: usize,
}

impl QueryFlags {
    pub fn options(&self, config: &AppConfig) -> FetchOptions {
        FetchOptions::new()
            .reindex(self.reindex || config.defaults.reindex)
            .datetime_index(self.datetime_index || config.defaults.datetime_index)
            .delay(self.delay)
    }
}

/// A day-shaped result ready for display.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Table(Table),
    Series(Series),
}

impl Rendered {
    pub fn print(&self, title: &str) {
        println!("{}", ui::style_text(title, ui::StyleType::Title));
        match self {
            Rendered::Table(table) if table.n_cols() == 0 => {
                println!("{}", ui::style_text("No values found", ui::StyleType::Subtle));
            }
            Rendered::Table(table) => println!("{}", ui::table_view(table)),
            Rendered::Series(series) => println!("{}", ui::series_view(series)),
        }
    }
}

async fn run_shape<F>(
    fetcher: &F,
    field: &F::Field,
    shape: &Shape,
    opts: FetchOptions,
) -> Result<Rendered>
where
    F: Fetcher<Output = Table, Daily = Series>,
{
    let rendered = match shape {
        Shape::Range {
            start,
            end,
            backdays,
        } => Rendered::Table(
            fetcher
                .fetch(field, start, end.as_deref(), *backdays, opts)
                .await?,
        ),
        Shape::History { date, backdays } => {
            Rendered::Table(fetcher.fetch_history(field, date, *backdays, opts).await?)
        }
        Shape::Daily { date, offset } => {
            Rendered::Series(fetcher.fetch_daily(field, date, *offset, opts).await?)
        }
    };
    Ok(rendered)
}

/// Store, market context and configuration shared by every query.
#[derive(Clone)]
pub struct Session {
    pub store: Arc<dyn FieldStore>,
    pub context: MarketContext,
    pub config: AppConfig,
}

impl Session {
    pub fn new(store: Arc<dyn FieldStore>, context: MarketContext, config: AppConfig) -> Self {
        Self {
            store,
            context,
            config,
        }
    }

    /// Role of `collection`; names missing from the configuration are rejected.
    pub fn kind(&self, collection: &str) -> Result<CollectionKind> {
        self.config.collections.kind(collection).with_context(|| {
            let configured: Vec<&str> = self
                .config
                .collections
                .entries()
                .iter()
                .map(|(_, name)| *name)
                .collect();
            format!(
                "Unknown collection {collection}, configured: {}",
                configured.join(", ")
            )
        })
    }

    async fn day_fetcher(&self, collection: &str) -> Result<DayFetcher> {
        DayFetcher::new(self.store.clone(), self.context.clone(), collection)
            .await
            .with_context(|| format!("Failed to bind collection {collection}"))
    }

    /// Field names stored in `collection`.
    pub async fn fields(&self, collection: &str) -> Result<Vec<String>> {
        let kind = self.kind(collection)?;
        debug!(collection, ?kind, "Listing fields");
        let fetcher = self.day_fetcher(collection).await?;
        Ok(fetcher.dnames().into_iter().map(str::to_string).collect())
    }

    /// Runs a day query, picking the fetcher bound to `collection`.
    pub async fn day_query(
        &self,
        collection: &str,
        dname: &str,
        shape: &Shape,
        opts: FetchOptions,
    ) -> Result<Rendered> {
        let kind = self.kind(collection)?;
        if kind == CollectionKind::Minute {
            anyhow::bail!("{collection} holds intraday fields, use the intraday command");
        }
        info!(collection, ?kind, dname, ?shape, "Running query");

        let inner = self.day_fetcher(collection).await?;
        let rendered = match kind {
            CollectionKind::Quote => {
                let Ok(field) = dname.parse::<QuoteField>();
                match field {
                    QuoteField::ReturnsN(_) => {
                        let fetcher = QuoteFetcher::new(inner, &self.config.returns_field)?;
                        run_shape(&fetcher, &field, shape, opts).await?
                    }
                    QuoteField::Stored(_) => run_shape(&inner, dname, shape, opts).await?,
                }
            }
            CollectionKind::Cax => run_shape(&CaxFetcher::new(inner), dname, shape, opts).await?,
            CollectionKind::Misc => run_shape(&MiscFetcher::new(inner), dname, shape, opts).await?,
            CollectionKind::Shares | CollectionKind::Consensus | CollectionKind::Minute => {
                run_shape(&inner, dname, shape, opts).await?
            }
        };
        Ok(rendered)
    }

    /// Compounded `horizon`-day returns over `[start, end]`.
    pub async fn returns(
        &self,
        horizon: usize,
        start: &str,
        end: Option<&str>,
        opts: FetchOptions,
    ) -> Result<Table> {
        let field = QuoteField::returns(horizon);
        let inner = self.day_fetcher(&self.config.collections.quote).await?;
        let fetcher = QuoteFetcher::new(inner, &self.config.returns_field)
            .context("Quote collection has no stored returns")?;
        info!(%field, start, ?end, "Compounding returns");
        Ok(fetcher.fetch(&field, start, end, 0, opts).await?)
    }

    /// One day's intraday cross-section at `times`.
    pub async fn intraday(
        &self,
        dname: &str,
        date: &str,
        times: Vec<String>,
        offset: usize,
        opts: FetchOptions,
    ) -> Result<MinuteDaily> {
        let times = match <[String; 1]>::try_from(times) {
            Ok([time]) => Times::Single(time),
            Err(times) => Times::Many(times),
        };
        let field = MinuteField::new(dname, times);
        let collection = &self.config.collections.minute;
        let fetcher = MinuteFetcher::new(self.store.clone(), self.context.clone(), collection)
            .await
            .with_context(|| format!("Failed to bind collection {collection}"))?;
        info!(
            collection = fetcher.collection(),
            dname,
            date,
            offset,
            "Reading intraday cross-section"
        );
        Ok(fetcher.fetch_daily(&field, date, offset, opts).await?)
    }
}

pub fn print_fields(collection: &str, dnames: &[String]) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell(collection)]);
    for dname in dnames {
        table.add_row(vec![dname]);
    }
    println!("{table}");
}

impl From<MinuteDaily> for Rendered {
    fn from(daily: MinuteDaily) -> Self {
        match daily {
            MinuteDaily::Series(series) => Rendered::Series(series),
            MinuteDaily::Table(table) => Rendered::Table(table),
        }
    }
}
