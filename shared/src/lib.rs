pub mod config;
pub mod error;
pub mod insights;
pub mod responses;
pub mod sockets;
pub mod store;
pub mod types;
pub mod users;

use aws_config::SdkConfig;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use std::sync::Arc;

use config::{Config, StoreBackend};
use insights::{InsightsService, ViewerRegistry};
use sockets::{ApiGatewayChannel, LiveChannel, MemoryChannel, NoopChannel, SubscriptionStore};
use store::{CommentStore, DynamoStore, FollowStore, InsightsStore, LikeStore, MemoryStore, UserStore};

/// Shared application state
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub follows: Arc<dyn FollowStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub insights: InsightsService,
    pub config: Config,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        follows: Arc<dyn FollowStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        insights: InsightsService,
        config: Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            users,
            follows,
            subscriptions,
            insights,
            config,
        })
    }

    /// Wire stores and the live channel for the configured backend.
    pub fn from_config(config: Config, aws: &SdkConfig) -> Arc<Self> {
        match config.store_backend {
            StoreBackend::Dynamo => {
                tracing::info!("Using DynamoDB table {}", config.table_name);
                let store = Arc::new(DynamoStore::new(DynamoClient::new(aws), config.table_name.clone()));
                let channel = live_channel(&config, aws, store.clone());
                Self::wire(store, channel, config)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store, nothing survives a restart");
                let store = Arc::new(MemoryStore::new());
                let channel = live_channel(&config, aws, store.clone());
                Self::wire(store, channel, config)
            }
        }
    }

    /// Memory-backed state with a recording channel.
    pub fn in_memory(store: Arc<MemoryStore>) -> (Arc<Self>, Arc<MemoryChannel>) {
        let mut config = Config::from_lookup(|_| None);
        config.store_backend = StoreBackend::Memory;

        let channel = Arc::new(MemoryChannel::new());
        let state = Self::wire(store, channel.clone(), config);
        (state, channel)
    }

    fn wire<S>(store: Arc<S>, channel: Arc<dyn LiveChannel>, config: Config) -> Arc<Self>
    where
        S: UserStore + FollowStore + InsightsStore + LikeStore + CommentStore + SubscriptionStore + 'static,
    {
        let insights = InsightsService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            channel,
            Arc::new(ViewerRegistry::new()),
            config.insights_topic_prefix.clone(),
        );

        Self::new(store.clone(), store.clone(), store, insights, config)
    }
}

fn live_channel(
    config: &Config,
    aws: &SdkConfig,
    subscriptions: Arc<dyn SubscriptionStore>,
) -> Arc<dyn LiveChannel> {
    match &config.ws_api_endpoint {
        Some(endpoint) => {
            let api_config = aws_sdk_apigatewaymanagement::config::Builder::from(aws)
                .endpoint_url(endpoint)
                .build();
            Arc::new(ApiGatewayChannel::new(
                ApiGatewayManagementClient::from_conf(api_config),
                subscriptions,
            ))
        }
        None => {
            tracing::info!("WS_API_ENDPOINT not set, live updates are disabled");
            Arc::new(NoopChannel)
        }
    }
}
