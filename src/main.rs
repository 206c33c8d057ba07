use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};

use cartpay_api as api;
use cartpay_api::gateway::{PaymentGateway, RazorpayGateway};
use cartpay_api::repositories::{
    InMemoryOrderRecordRepository, OrderRecordRepository, SeaOrmOrderRecordRepository,
};
use cartpay_api::services::{
    order_recovery, CouponCatalog, OrderCreationService, PaymentVerificationService,
    PendingOrderQueue, PriceList, PricingService, RetryPolicy, StaticCouponCatalog,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);
    api::handlers::health::init_start_time();

    let coupons: Arc<dyn CouponCatalog> = match &cfg.coupons_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading coupon catalog {}", path))?;
            let catalog = StaticCouponCatalog::from_json(&raw)
                .with_context(|| format!("parsing coupon catalog {}", path))?;
            info!(coupons = catalog.len(), "Loaded coupon catalog from {}", path);
            catalog.into_shared()
        }
        None => StaticCouponCatalog::reference().into_shared(),
    };

    // Order records
    let repo: Arc<dyn OrderRecordRepository> = if cfg.uses_in_memory_store() {
        warn!("Using in-memory order record store; records are lost on restart");
        Arc::new(InMemoryOrderRecordRepository::new())
    } else {
        let db = api::db::connect(&api::db::DbConfig::from(&cfg))
            .await
            .context("connecting to database")?;
        api::db::ensure_schema(&db).await.context("preparing schema")?;
        Arc::new(SeaOrmOrderRecordRepository::new(Arc::new(db)))
    };

    // Gateway
    let gateway: Option<Arc<dyn PaymentGateway>> = match cfg.gateway.credentials() {
        Some((key_id, key_secret)) => Some(Arc::new(RazorpayGateway::new(
            key_id,
            key_secret,
            cfg.gateway.base_url.clone(),
            cfg.gateway.timeout(),
        )?)),
        None => {
            warn!("Gateway credentials not configured; order creation and verification will fail");
            None
        }
    };

    let mut orders = OrderCreationService::new(gateway, cfg.gateway.timeout())
        .with_default_currency(cfg.default_currency.clone())
        .with_receipt_ttl(cfg.receipt_ttl());
    if let Some(path) = &cfg.price_list_path {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading price list {}", path))?;
        let prices = PriceList::from_json(&raw)
            .with_context(|| format!("parsing price list {}", path))?;
        info!(products = prices.len(), "Server-side amount recomputation enabled");
        orders = orders.with_pricing(
            PricingService::new(Arc::new(prices), coupons.clone()),
            cfg.require_priced_intents,
        );
    } else {
        warn!("No price list configured; client-declared amounts are trusted");
    }

    let pending = Arc::new(PendingOrderQueue::new(RetryPolicy {
        max_attempts: cfg.pending_max_attempts,
        ..Default::default()
    }));
    let payments = PaymentVerificationService::new(
        cfg.gateway.key_secret.clone(),
        repo.clone(),
        pending.clone(),
    );
    order_recovery::start_worker(pending, repo, cfg.pending_retry_interval());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let state = api::AppState {
        config: Arc::new(cfg),
        orders: Arc::new(orders),
        payments: Arc::new(payments),
    };
    let app = api::build_router(state)?;

    // Bind and serve
    info!("cartpay-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
