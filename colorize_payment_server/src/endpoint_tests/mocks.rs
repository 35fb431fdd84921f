use colorize_payment_engine::{
    db_types::{Order, OrderId},
    traits::{GatewayError, PaymentGatewayClient},
};
use cpg_common::PaymentObservation;
use gateway_tools::{CheckoutSession, CustomerDetails, GatewayApiError};
use mockall::mock;

use crate::integrations::{
    asset_store::{AssetBytes, AssetStore, AssetStoreError},
    gateway::CheckoutGateway,
};

mock! {
    pub Gateway {}
    impl PaymentGatewayClient for Gateway {
        async fn query_status(&self, order_id: &OrderId) -> Result<PaymentObservation, GatewayError>;
    }
}

mock! {
    pub Checkout {}
    impl CheckoutGateway for Checkout {
        async fn create_checkout(
            &self,
            order: &Order,
            customer: CustomerDetails,
        ) -> Result<CheckoutSession, GatewayApiError>;
    }
}

mock! {
    pub AssetStorage {}
    impl AssetStore for AssetStorage {
        async fn fetch(&self, location: &str) -> Result<AssetBytes, AssetStoreError>;
    }
}

/// A gateway that reports the same state for every order.
pub fn gateway_reporting(state: &'static str) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_query_status().returning(move |_| {
        let mut observation = PaymentObservation::new(state);
        observation.provider_payment_id = Some("cf_pay_1001".into());
        Ok(observation)
    });
    gateway
}

/// A gateway that must not be called.
pub fn silent_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_query_status().never();
    gateway
}
