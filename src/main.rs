use clap::Parser;
use serde::Serialize;
use storefront_client::config::{Args, Command};
use storefront_client::models::ProductQuery;
use storefront_client::{ApiClient, metrics};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_client=info,storefront=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // parse cli arguments
    let args = Args::parse();
    let client = ApiClient::new(args.to_config())?;
    tracing::debug!(api_url = client.base_url(), timeout_secs = args.timeout, "client ready");

    let outcome = run(&client, &args.command).await;

    if args.metrics {
        eprintln!("{}", metrics::render());
    }

    match outcome {
        Ok(json) => {
            println!("{}", json);
            Ok(())
        }
        Err(e) => {
            // the translated error is what a UI would show
            eprintln!("{}", serde_json::to_string_pretty(&e)?);
            Err(anyhow::anyhow!("{}", e.message))
        }
    }
}

async fn run(client: &ApiClient, command: &Command) -> Result<String, storefront_client::ApiError> {
    match command {
        Command::Products {
            category,
            search,
            page,
            limit,
        } => {
            let query = ProductQuery {
                page: Some(*page),
                limit: Some(*limit),
                category: category.clone(),
                search: search.clone(),
                sort: None,
            };
            render(&client.list_products(&query).await?)
        }
        Command::Product { id } => render(&client.get_product(id).await?),
        Command::Categories => render(&client.list_categories().await?),
        Command::Order { id } => render(&client.get_order(id).await?),
        Command::Track { tracking_number } => render(&client.track_shipment(tracking_number).await?),
        Command::Csrf => render(&client.fetch_csrf_token().await?),
    }
}

fn render<T: Serialize>(value: &T) -> Result<String, storefront_client::ApiError> {
    serde_json::to_string_pretty(value).map_err(storefront_client::ApiError::invalid_response)
}
