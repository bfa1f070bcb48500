//! Development and preview servers.
//!
//! Built on `tiny_http`:
//!
//! - `serve_pages`: virtual pages rendered from memory, request
//!   rewriting, file watching with hot page-list reconfiguration, and
//!   full-reload push over WebSocket
//! - `preview_pages`: the built output directory behind the same
//!   rewrite engine, no virtual rendering
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    Pipeline stages         Reload registry
//!    rewrite → virtual       Push full reload
//!    → static → 404          on template edits
//! └─────────────────────────────────────────────┘
//! ```

mod middleware;
mod reload;

pub use reload::ReloadHub;

use crate::build::log_virtual_files;
use crate::config::AppConfig;
use crate::log;
use crate::registry::{self, RegistryHandle};
use crate::rewrite::{DiskOracle, RewriteEngine};
use crate::watch::watch_for_changes_blocking;
use anyhow::{Context, Result};
use middleware::{NotFoundStage, Pipeline, RewriteStage, StaticStage, VirtualPageStage};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    thread,
};
use tiny_http::Server;

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Start the development server.
///
/// Blocks until Ctrl+C.
pub fn serve_pages(config: &'static AppConfig) -> Result<()> {
    let snapshot = registry::compile_from_config(config)?;
    if config.serve.verbose {
        log_virtual_files(config, &snapshot);
    }
    let registry = Arc::new(RegistryHandle::new(snapshot));

    let interface: IpAddr = config.serve.interface.parse()?;
    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    // Set up Ctrl+C handler for graceful shutdown
    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    // Reload hub + watcher thread
    let hub = if config.serve.watch {
        let hub = ReloadHub::start(interface, addr.port().saturating_add(1))?;
        let watch_registry = Arc::clone(&registry);
        let watch_hub = Arc::clone(&hub);
        thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(config, watch_registry, Some(watch_hub)) {
                log!("watch"; "{err}");
            }
        });
        Some(hub)
    } else {
        None
    };

    log!("serve"; "http://{addr}");

    let inject = hub.as_ref().map(|hub| hub.client_script());
    let pipeline = dev_pipeline(config, Arc::clone(&registry), inject)?;

    for request in server.incoming_requests() {
        if let Err(err) = pipeline.handle(request) {
            log!("serve"; "request error: {err}");
        }
    }

    Ok(())
}

/// Serve the built output directory with the preview rewrite rules.
///
/// Blocks until Ctrl+C.
pub fn preview_pages(config: &'static AppConfig) -> Result<()> {
    let snapshot = registry::compile_from_config(config)?;
    let registry = Arc::new(RegistryHandle::new(snapshot));

    let interface: IpAddr = config.serve.interface.parse()?;
    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "previewing {} at http://{}", config.build.output.display(), addr);

    let out_root = config.get_root().join(&config.build.output);
    let engine = RewriteEngine::from_config(
        &config.serve.preview_rewrites,
        &config.base(),
        Box::new(DiskOracle::new(out_root.clone())),
    )?;
    let pipeline = Pipeline::new(vec![
        Box::new(RewriteStage {
            engine,
            registry,
            verbose: config.serve.verbose,
        }),
        Box::new(StaticStage { root: out_root }),
        Box::new(NotFoundStage),
    ]);

    for request in server.incoming_requests() {
        if let Err(err) = pipeline.handle(request) {
            log!("serve"; "request error: {err}");
        }
    }

    Ok(())
}

fn dev_pipeline(
    config: &AppConfig,
    registry: Arc<RegistryHandle>,
    inject: Option<String>,
) -> Result<Pipeline> {
    let base = config.base();
    let root = config.get_root().to_path_buf();

    let engine = RewriteEngine::from_config(
        &config.serve.rewrites,
        &base,
        Box::new(DiskOracle::new(root.clone())),
    )?;

    Ok(Pipeline::new(vec![
        Box::new(RewriteStage {
            engine,
            registry: Arc::clone(&registry),
            verbose: config.serve.verbose,
        }),
        Box::new(VirtualPageStage {
            registry,
            base,
            default_template: config.build.template.clone(),
            root: root.clone(),
            minify: config.build.minify,
            inject,
        }),
        Box::new(StaticStage { root }),
        Box::new(NotFoundStage),
    ]))
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < max_retries => {
                // Will retry silently
                continue;
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to bind after {} attempts (ports {}-{}): {}",
                    max_retries,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}
