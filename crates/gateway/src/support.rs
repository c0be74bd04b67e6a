use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use supportdesk_core::{
    translate_legacy_case_status, CaseNumber, CaseRequest, CustomerId, NewComment, SupportCase,
};

use crate::error::GatewayError;
use crate::http::{decode, ServiceClient};
use crate::wire::UpdateCaseTypeRequest;

/// Support service operations. Mutations take the version the caller last
/// saw; `None` sends no precondition.
#[async_trait]
pub trait SupportGateway: Send + Sync {
    async fn create_case(&self, request: &CaseRequest) -> Result<SupportCase, GatewayError>;

    async fn get_case(&self, case_number: &CaseNumber) -> Result<SupportCase, GatewayError>;

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<SupportCase>, GatewayError>;

    async fn close_case(
        &self,
        case_number: &CaseNumber,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError>;

    async fn reopen_case(
        &self,
        case_number: &CaseNumber,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError>;

    async fn assign_agent(
        &self,
        case_number: &CaseNumber,
        agent_id: &str,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError>;

    async fn update_case_type(
        &self,
        case_number: &CaseNumber,
        request: &UpdateCaseTypeRequest,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError>;

    async fn add_comment(
        &self,
        case_number: &CaseNumber,
        comment: &NewComment,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError>;
}

pub struct HttpSupportGateway {
    client: ServiceClient,
}

impl HttpSupportGateway {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    async fn put(
        &self,
        path: String,
        body: Option<&Value>,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError> {
        let value = self.client.send_value(Method::PUT, &path, body, expected_version).await?;
        support_case_from_value(value)
    }
}

#[async_trait]
impl SupportGateway for HttpSupportGateway {
    async fn create_case(&self, request: &CaseRequest) -> Result<SupportCase, GatewayError> {
        let value = self.client.send_value(Method::POST, "/support-cases", Some(request), None).await?;
        support_case_from_value(value)
    }

    async fn get_case(&self, case_number: &CaseNumber) -> Result<SupportCase, GatewayError> {
        let value = self.client.get_value(&format!("/support-cases/{}", case_number.0)).await?;
        support_case_from_value(value)
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<SupportCase>, GatewayError> {
        let value =
            self.client.get_value(&format!("/support-cases/customer/{}", customer_id.0)).await?;
        match value {
            Value::Array(items) => items.into_iter().map(support_case_from_value).collect(),
            other => Err(GatewayError::Decode(format!("expected a list of cases, got {other}"))),
        }
    }

    async fn close_case(
        &self,
        case_number: &CaseNumber,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError> {
        self.put(format!("/support-cases/{}/close", case_number.0), None, expected_version).await
    }

    async fn reopen_case(
        &self,
        case_number: &CaseNumber,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError> {
        self.put(format!("/support-cases/{}/reopen", case_number.0), None, expected_version).await
    }

    async fn assign_agent(
        &self,
        case_number: &CaseNumber,
        agent_id: &str,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError> {
        self.put(
            format!("/support-cases/{}/assign/{agent_id}", case_number.0),
            None,
            expected_version,
        )
        .await
    }

    async fn update_case_type(
        &self,
        case_number: &CaseNumber,
        request: &UpdateCaseTypeRequest,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError> {
        let body = serde_json::to_value(request)
            .map_err(|error| GatewayError::Decode(error.to_string()))?;
        self.put(format!("/support-cases/{}/type", case_number.0), Some(&body), expected_version)
            .await
    }

    async fn add_comment(
        &self,
        case_number: &CaseNumber,
        comment: &NewComment,
        expected_version: Option<u64>,
    ) -> Result<SupportCase, GatewayError> {
        let value = self
            .client
            .send_value(
                Method::POST,
                &format!("/support-cases/{}/comments", case_number.0),
                Some(comment),
                expected_version,
            )
            .await?;
        support_case_from_value(value)
    }
}

/// Decodes a case, accepting legacy status spellings such as `resolved`.
fn support_case_from_value(mut value: Value) -> Result<SupportCase, GatewayError> {
    if let Some(status) = value.get_mut("status") {
        if let Some(raw) = status.as_str() {
            let canonical = translate_legacy_case_status(raw)
                .map_err(|error| GatewayError::Decode(error.to_string()))?;
            *status = Value::from(canonical.as_str());
        }
    }
    decode(value)
}
