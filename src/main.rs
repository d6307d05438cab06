use std::{io::Write, process, sync::Arc, time::Duration};

use sas_blog::{
    application::{
        context::StorefrontContext,
        error::AppError,
        repos::{BlogRepo, SeoUrlsRepo},
        seo::SeoUrlIndexer,
        sitemap::BlogUrlProvider,
    },
    cache::{CacheBackend, CacheInvalidator, MemoryTagCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState},
        memory::MemoryBlogStore,
        telemetry,
    },
};
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::SeoIndex(_) => run_seo_index(settings).await,
        config::Command::Sitemap(args) => run_sitemap(settings, args).await,
    }
}

struct Stores {
    blogs: Arc<dyn BlogRepo>,
    seo_urls: Arc<dyn SeoUrlsRepo>,
}

async fn init_stores(settings: &config::Settings) -> Result<Stores, AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!(
            target: "sas_blog::bootstrap",
            "no database url configured; serving from an empty in-memory store"
        );
        let store = Arc::new(MemoryBlogStore::new());
        return Ok(Stores {
            blogs: store.clone(),
            seo_urls: store,
        });
    };

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    let repositories = Arc::new(PostgresRepositories::new(pool));
    Ok(Stores {
        blogs: repositories.clone(),
        seo_urls: repositories,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let stores = init_stores(&settings).await?;

    let backend: Arc<dyn CacheBackend> = Arc::new(MemoryTagCache::new(&settings.cache));
    let mut http_state = HttpState::new(
        stores.blogs.clone(),
        stores.seo_urls.clone(),
        settings.site.clone(),
        config::DEFAULT_SITEMAP_PAGE_SIZE,
    );
    if settings.cache.enabled {
        http_state = http_state.with_detail_cache(backend.clone(), &settings.cache);
    }

    let admin_state = AdminState {
        blogs: stores.blogs,
        invalidator: Arc::new(CacheInvalidator::new(settings.cache.enabled, backend)),
    };

    serve_http(&settings, http_state, admin_state).await
}

async fn run_seo_index(settings: config::Settings) -> Result<(), AppError> {
    let stores = init_stores(&settings).await?;
    let written = SeoUrlIndexer::new(stores.blogs, stores.seo_urls)
        .reindex_all()
        .await?;
    info!(target: "sas_blog::seo_index", written, "seo index complete");
    Ok(())
}

async fn run_sitemap(
    settings: config::Settings,
    args: config::SitemapArgs,
) -> Result<(), AppError> {
    let stores = init_stores(&settings).await?;
    let provider = BlogUrlProvider::new(stores.blogs, stores.seo_urls);
    let xml = provider
        .sitemap_xml(
            &settings.site.public_url,
            &StorefrontContext::default(),
            args.page_size,
        )
        .await?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(xml.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(InfraError::from)?;
    Ok(())
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_addr = settings.server.public_addr;
    let admin_addr = settings.server.admin_addr;
    let public_listener = tokio::net::TcpListener::bind(public_addr)
        .await
        .map_err(|err| InfraError::bind(public_addr, err))?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|err| InfraError::bind(admin_addr, err))?;

    info!(
        target: "sas_blog::bootstrap",
        public = %public_addr,
        admin = %admin_addr,
        "listeners ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx));

    let servers = async { try_join!(public_server, admin_server) };
    tokio::pin!(servers);

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = &mut servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_after_signal(shutdown_tx, grace) => {
            warn!(
                target: "sas_blog::bootstrap",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out"
            );
        }
    }

    Ok(())
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    // a dropped sender also ends the wait
    let _ = rx.wait_for(|requested| *requested).await;
}

/// Waits for ctrl-c, asks both servers to drain, then gives them `grace`.
async fn drain_after_signal(tx: watch::Sender<bool>, grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target: "sas_blog::bootstrap", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target: "sas_blog::bootstrap", "shutdown requested; draining connections");
    let _ = tx.send(true);
    tokio::time::sleep(grace).await;
}
