use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use supportdesk_core::{
    translate_legacy_refund_status, CustomerId, NewRefundRequest, RefundCase, RefundCaseId,
};

use crate::error::GatewayError;
use crate::http::{decode, ServiceClient};
use crate::wire::{DecisionRequest, RefundCaseDetail};

#[async_trait]
pub trait RefundGateway: Send + Sync {
    async fn create_refund(&self, request: &NewRefundRequest) -> Result<RefundCase, GatewayError>;

    async fn get_refund(&self, id: &RefundCaseId) -> Result<RefundCase, GatewayError>;

    async fn get_detailed(&self, id: &RefundCaseId) -> Result<RefundCaseDetail, GatewayError>;

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<RefundCase>, GatewayError>;

    async fn submit_decision(
        &self,
        id: &RefundCaseId,
        decision: &DecisionRequest,
        expected_version: Option<u64>,
    ) -> Result<RefundCase, GatewayError>;

    async fn complete(
        &self,
        id: &RefundCaseId,
        expected_version: Option<u64>,
    ) -> Result<RefundCase, GatewayError>;
}

pub struct HttpRefundGateway {
    client: ServiceClient,
}

impl HttpRefundGateway {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }
}

#[async_trait]
impl RefundGateway for HttpRefundGateway {
    async fn create_refund(&self, request: &NewRefundRequest) -> Result<RefundCase, GatewayError> {
        let value = self.client.send_value(Method::POST, "/refund-cases", Some(request), None).await?;
        refund_from_value(value)
    }

    async fn get_refund(&self, id: &RefundCaseId) -> Result<RefundCase, GatewayError> {
        let value = self.client.get_value(&format!("/refund-cases/{}", id.0)).await?;
        refund_from_value(value)
    }

    async fn get_detailed(&self, id: &RefundCaseId) -> Result<RefundCaseDetail, GatewayError> {
        let mut value = self.client.get_value(&format!("/refund-cases/{}/detailed", id.0)).await?;
        if let Some(refund) = value.get_mut("refund_case") {
            canonicalize_refund_status(refund)?;
        }
        decode(value)
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<RefundCase>, GatewayError> {
        let value =
            self.client.get_value(&format!("/refund-cases/customer/{}", customer_id.0)).await?;
        match value {
            Value::Array(items) => items.into_iter().map(refund_from_value).collect(),
            other => Err(GatewayError::Decode(format!("expected a list of refunds, got {other}"))),
        }
    }

    async fn submit_decision(
        &self,
        id: &RefundCaseId,
        decision: &DecisionRequest,
        expected_version: Option<u64>,
    ) -> Result<RefundCase, GatewayError> {
        let value = self
            .client
            .send_value(
                Method::POST,
                &format!("/refund-cases/{}/decisions", id.0),
                Some(decision),
                expected_version,
            )
            .await?;
        refund_from_value(value)
    }

    async fn complete(
        &self,
        id: &RefundCaseId,
        expected_version: Option<u64>,
    ) -> Result<RefundCase, GatewayError> {
        let value = self
            .client
            .send_value(
                Method::PUT,
                &format!("/refund-cases/{}/complete", id.0),
                None::<&()>,
                expected_version,
            )
            .await?;
        refund_from_value(value)
    }
}

fn refund_from_value(mut value: Value) -> Result<RefundCase, GatewayError> {
    canonicalize_refund_status(&mut value)?;
    decode(value)
}

/// Rewrites legacy refund statuses (`processing`, `executed`, ...) to the
/// canonical lowercase names before decoding.
fn canonicalize_refund_status(value: &mut Value) -> Result<(), GatewayError> {
    if let Some(status) = value.get_mut("status") {
        if let Some(raw) = status.as_str() {
            let canonical = translate_legacy_refund_status(raw)
                .map_err(|error| GatewayError::Decode(error.to_string()))?;
            *status = Value::from(canonical.as_str());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::canonicalize_refund_status;
    use crate::error::GatewayError;

    #[test]
    fn legacy_refund_statuses_are_canonicalized() {
        let mut value = json!({ "status": "executed" });
        canonicalize_refund_status(&mut value).expect("known legacy status");
        assert_eq!(value["status"], "completed");

        let mut value = json!({ "status": "processing" });
        canonicalize_refund_status(&mut value).expect("known legacy status");
        assert_eq!(value["status"], "approved");

        let mut value = json!({ "status": "teleported" });
        assert!(matches!(canonicalize_refund_status(&mut value), Err(GatewayError::Decode(_))));
    }
}
