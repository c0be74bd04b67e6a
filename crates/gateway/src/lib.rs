//! Typed REST clients for the support and refund services.

pub mod auth;
pub mod error;
pub mod http;
pub mod refund;
pub mod support;
pub mod wire;

use std::time::Duration;

use supportdesk_core::config::AppConfig;

pub use auth::AuthContext;
pub use error::GatewayError;
pub use http::{retry_once_on_conflict, RetryPolicy, ServiceClient};
pub use refund::{HttpRefundGateway, RefundGateway};
pub use support::{HttpSupportGateway, SupportGateway};
pub use wire::{
    DecisionRequest, RefundCaseDetail, SupportCaseSummary, UpdateCaseTypeRequest,
    UpdateProductsRequest,
};

/// Both service clients for one identity.
pub struct Gateways {
    pub support: HttpSupportGateway,
    pub refund: HttpRefundGateway,
}

impl Gateways {
    pub fn from_config(config: &AppConfig, auth: AuthContext) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(config.services.timeout_secs);
        let retry = RetryPolicy::from_config(&config.services);

        Ok(Self {
            support: HttpSupportGateway::new(ServiceClient::new(
                &config.services.support_url,
                auth.clone(),
                timeout,
                retry,
            )?),
            refund: HttpRefundGateway::new(ServiceClient::new(
                &config.services.refund_url,
                auth,
                timeout,
                retry,
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use supportdesk_core::config::AppConfig;
    use supportdesk_core::ActorRole;

    use super::{AuthContext, Gateways};

    #[test]
    fn each_client_targets_its_configured_service() {
        let mut config = AppConfig::default();
        config.services.support_url = "http://support.internal:9000/".to_owned();
        config.services.refund_url = "http://refunds.internal:9100".to_owned();

        let gateways =
            Gateways::from_config(&config, AuthContext::new("agent-7", ActorRole::Agent))
                .expect("gateways");

        assert_eq!(gateways.support.client().base_url(), "http://support.internal:9000");
        assert_eq!(gateways.refund.client().base_url(), "http://refunds.internal:9100");
        assert_eq!(gateways.refund.client().auth().user_id(), "agent-7");
    }
}
