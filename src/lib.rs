pub mod cli;
pub mod core;
pub mod fetchers;
pub mod store;

use crate::cli::query::{self, QueryFlags, Rendered, Session, Shape};
use crate::core::calendar::MarketContext;
use crate::core::config::AppConfig;
use crate::store::DiskStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Commands that need the field store.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Fields {
        collection: String,
    },
    Query {
        collection: String,
        dname: String,
        shape: Shape,
        flags: QueryFlags,
    },
    Returns {
        horizon: usize,
        start: String,
        end: Option<String>,
        flags: QueryFlags,
    },
    Intraday {
        dname: String,
        date: String,
        times: Vec<String>,
        offset: usize,
        flags: QueryFlags,
    },
}

/// Opens the store named by the configuration and loads the market context.
pub async fn open_session(config: AppConfig) -> Result<Session> {
    let data_path = config.data_path()?;
    let store = DiskStore::open(&data_path)
        .with_context(|| format!("Failed to open field store at {}", data_path.display()))?;
    let context = MarketContext::load(&store)
        .await
        .context("Failed to load trading calendar and universe")?;
    info!(
        dates = context.calendar.len(),
        sids = context.universe.len(),
        "Loaded market context"
    );
    Ok(Session::new(Arc::new(store), context, config))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let session = open_session(config).await?;
    match command {
        AppCommand::Fields { collection } => {
            let dnames = session.fields(&collection).await?;
            query::print_fields(&collection, &dnames);
        }
        AppCommand::Query {
            collection,
            dname,
            shape,
            flags,
        } => {
            let opts = flags.options(&session.config);
            let rendered = session.day_query(&collection, &dname, &shape, opts).await?;
            rendered.print(&format!("{collection}.{dname}"));
        }
        AppCommand::Returns {
            horizon,
            start,
            end,
            flags,
        } => {
            let opts = flags.options(&session.config);
            let table = session
                .returns(horizon, &start, end.as_deref(), opts)
                .await?;
            Rendered::Table(table).print(&format!("returns{horizon}"));
        }
        AppCommand::Intraday {
            dname,
            date,
            times,
            offset,
            flags,
        } => {
            let opts = flags.options(&session.config);
            let daily = session.intraday(&dname, &date, times, offset, opts).await?;
            Rendered::from(daily).print(&format!("{dname} on {date}"));
        }
    }
    Ok(())
}
