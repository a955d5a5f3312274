//! Watch command: a long-lived query that reprints on change
//!
//! The query reacts to invalidations, connectivity changes and its
//! auto-refresh ticker; a probe task pings the API to drive the
//! online/offline flag.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use log::debug;
use tokio::task::JoinHandle;

use crate::cache::{NetworkStatus, QueryOptions, QueryState};
use crate::cli::args::GlobalOptions;
use crate::cli::context::CommandContext;
use crate::cli::{ListArgs, OutputFormat};
use crate::client::{Page, Resource, ResourceApi};
use crate::error::Result;
use crate::output::render_page;

/// Run the watch command until interrupted
pub async fn run(
    opts: &GlobalOptions,
    resource: Resource,
    list: &ListArgs,
    interval: Option<u64>,
    probe_secs: u64,
) -> Result<()> {
    let ctx = CommandContext::new(opts).await?;
    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.cache.auto_refresh_interval());

    let query = ctx.resource_query(
        resource,
        list.to_params(),
        QueryOptions::default()
            .expiration(ctx.config.cache.expiration())
            .auto_refresh(interval)
            .on_success(move |page: &Page| {
                debug!("{} changed: {} records", resource, page.data.len());
            })
            .on_error(move |e| debug!("{} fetch attempt failed: {}", resource, e)),
    );

    let mut states = query.subscribe();
    let task = query.spawn();
    let probe = spawn_probe(
        Arc::clone(&ctx.api),
        ctx.cache.network().clone(),
        Duration::from_secs(probe_secs.max(1)),
    );

    eprintln!(
        "{} {} {}",
        "Watching".cyan(),
        query.key().bold(),
        "(Ctrl+C to stop)".dimmed()
    );

    let mut view = WatchView::new(ctx.format);
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                for notice in view.notices(&state) {
                    eprintln!("{}", notice);
                }
                if let Some(page) = view.changed_page(&state) {
                    println!("{}", render_page(&page, ctx.format, query.key(), None)?);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    probe.abort();
    drop(task);
    Ok(())
}

/// Ping the API on a fixed period and publish reachability
fn spawn_probe(
    api: Arc<dyn ResourceApi>,
    network: NetworkStatus,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let online = match api.ping().await {
                Ok(()) => true,
                Err(e) => {
                    debug!("Connectivity probe failed: {}", e);
                    false
                }
            };
            network.set_online(online);
        }
    })
}

/// Decides what a state change should print
struct WatchView {
    format: OutputFormat,
    shown: Option<Page>,
    online: bool,
    error: Option<String>,
}

impl WatchView {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            shown: None,
            online: true,
            error: None,
        }
    }

    /// The page to print, if it differs from what is already on screen
    fn changed_page(&mut self, state: &QueryState<Page>) -> Option<Page> {
        let page = state.data.as_ref()?;
        if self.shown.as_ref() == Some(page) {
            return None;
        }
        self.shown = Some(page.clone());
        Some(page.clone())
    }

    /// Status lines for connectivity and error transitions
    fn notices(&mut self, state: &QueryState<Page>) -> Vec<String> {
        let mut out = Vec::new();

        if state.is_online != self.online {
            self.online = state.is_online;
            out.push(if state.is_online {
                format!("{} Back online", "✓".green())
            } else {
                format!("{} Offline; showing last known data", "⚠".yellow())
            });
        }

        let error = state.error.as_ref().map(|e| e.to_string());
        if error != self.error {
            if let Some(ref message) = error {
                out.push(format!("{} Refresh failed: {}", "✗".red(), message));
            }
            self.error = error;
        }

        // JSON consumers get data on stdout only
        if self.format == OutputFormat::Json {
            debug!("Suppressed {} watch notices", out.len());
            out.clear();
        }
        out
    }
}
